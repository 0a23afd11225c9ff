//! Turns expanded config lines into compile tasks and blob groupings.
//!
//! Planning runs single-threaded before the worker pool starts; the include
//! timestamp cache is only ever touched here.

use std::collections::BTreeMap;
use std::fs;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{anyhow, Context, Result};
use rustc_hash::FxHasher;

use shaderbake_common::options::Options;
use shaderbake_common::paths::{append_to_file_name, remove_leading_dot_dots, with_appended_ext};
use shaderbake_common::{Platform, ShaderModel, ShaderProfile, PDB_DIR};
use shaderbake_config::{parse_config_file, ConfigGlobals, ConfigLine};
use shaderbake_deps::DependencyTimes;

/// One compile unit, executed by exactly one worker.
#[derive(Debug, Clone)]
pub struct Task {
    /// Source path as written in the config, relative to the source dir.
    pub source: PathBuf,
    pub entry_point: String,
    pub profile: ShaderProfile,
    pub shader_model: ShaderModel,
    /// Per-line defines in declaration order, as passed to the compiler.
    pub defines: Vec<String>,
    /// Lexicographically sorted, space-separated rendering of `defines`.
    pub combined_defines: String,
    pub optimization_level: u32,
    /// Planned output location, extension left to the artifact writers.
    pub output_path_no_ext: PathBuf,
}

/// One permutation of a blob, in planning order.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobEntry {
    pub permutation_path_no_ext: PathBuf,
    pub combined_defines: String,
}

/// Blob base name (output path sans extension) to its permutations.
/// A `BTreeMap` keeps blob emission order deterministic across runs.
pub type BlobMap = BTreeMap<String, Vec<BlobEntry>>;

#[derive(Debug, Default)]
pub struct Plan {
    pub tasks: Vec<Task>,
    pub blobs: BlobMap,
}

pub struct Planner<'a> {
    options: &'a Options,
    deps: DependencyTimes,
    config_time: SystemTime,
}

impl<'a> Planner<'a> {
    pub fn new(options: &'a Options) -> Result<Self> {
        let mut config_time = mtime(&options.config_file).with_context(|| {
            format!(
                "can't read config file '{}'",
                options.config_file.display()
            )
        })?;

        // A rebuilt tool may emit different output; treat its own binary as
        // part of the configuration.
        if let Ok(exe) = std::env::current_exe() {
            if let Ok(exe_time) = mtime(&exe) {
                config_time = config_time.max(exe_time);
            }
        }

        Ok(Planner {
            options,
            deps: DependencyTimes::new(&options.include_dirs, &options.relaxed_includes),
            config_time,
        })
    }

    pub fn plan(&mut self) -> Result<Plan> {
        let globals = ConfigGlobals {
            defines: self.options.defines.clone(),
            shader_model: self.options.shader_model,
        };

        let lines = parse_config_file(&self.options.config_file, &globals).map_err(|err| {
            match err.line() {
                Some(line) => anyhow!(
                    "{}({line},0): ERROR: {err}",
                    self.options.config_file.display()
                ),
                None => anyhow::Error::new(err),
            }
        })?;

        let mut plan = Plan::default();
        for line in lines {
            self.process_line(&mut plan, line)?;
        }

        Ok(plan)
    }

    fn process_line(&mut self, plan: &mut Plan, line: ConfigLine) -> Result<()> {
        // DXBC has no notion of these stages.
        if self.options.platform == Platform::Dxbc && line.profile.unsupported_by_dxbc() {
            return Ok(());
        }

        let combined_defines = combine_defines(&line.defines);

        // Compiled shader name. Specifying -o for a shader removes the
        // original path, like --flatten does globally.
        let mut shader_name = remove_leading_dot_dots(&line.source).with_extension("");
        if self.options.flatten || line.output_dir.is_some() {
            if let Some(file_name) = shader_name.file_name() {
                shader_name = PathBuf::from(file_name);
            }
        }
        if line.entry_point != "main" {
            shader_name = append_to_file_name(&shader_name, &format!("_{}", line.entry_point));
        }
        if let Some(suffix) = &line.output_suffix {
            shader_name = append_to_file_name(&shader_name, suffix);
        }

        // Compiled permutation name.
        let mut permutation_name = shader_name.clone();
        if !line.defines.is_empty() {
            let hash = permutation_hash(&combined_defines);
            permutation_name = append_to_file_name(&permutation_name, &format!("_{hash:08X}"));
        }

        let mut output_dir = self.options.output_dir.clone();
        if let Some(sub) = &line.output_dir {
            output_dir.push(sub);
        }

        // Create intermediate output directories. A directory that had to be
        // created cannot hold up-to-date artifacts.
        let mut force = self.options.force;
        let mut end_path = output_dir.join(shader_name.parent().unwrap_or(Path::new("")));
        if self.options.pdb {
            end_path.push(PDB_DIR);
        }
        if !end_path.as_os_str().is_empty() && !end_path.exists() {
            fs::create_dir_all(&end_path)
                .with_context(|| format!("can't create directory '{}'", end_path.display()))?;
            force = true;
        }

        // Earliest artifact time across everything this line would emit.
        let mut output_time = None;
        let permutation_file = output_dir.join(&permutation_name);
        let blob_file = output_dir.join(&shader_name);
        let ext = &self.options.output_ext;

        probe_artifact(
            &with_appended_ext(&permutation_file, ext),
            self.options.binary,
            &mut force,
            &mut output_time,
        );
        probe_artifact(
            &with_appended_ext(&permutation_file, &format!("{ext}.h")),
            self.options.header,
            &mut force,
            &mut output_time,
        );
        probe_artifact(
            &with_appended_ext(&blob_file, ext),
            self.options.binary_blob,
            &mut force,
            &mut output_time,
        );
        probe_artifact(
            &with_appended_ext(&blob_file, &format!("{ext}.h")),
            self.options.header_blob,
            &mut force,
            &mut output_time,
        );

        // Early out if no changes were detected.
        if !force {
            let source_file = self.options.source_dir.join(&line.source);
            let source_time = self
                .deps
                .hierarchical_mtime(&source_file)
                .map_err(|err| anyhow!("{err}"))?
                .max(self.config_time);

            if output_time.is_some_and(|output_time| output_time > source_time) {
                return Ok(());
            }
        }

        let optimization_level = line
            .optimization_level
            .unwrap_or(self.options.optimization_level)
            .min(3);

        let output_path_no_ext = output_dir.join(&permutation_name);

        plan.tasks.push(Task {
            source: line.source,
            entry_point: line.entry_point,
            profile: line.profile,
            shader_model: line.shader_model,
            defines: line.defines,
            combined_defines: combined_defines.clone(),
            optimization_level,
            output_path_no_ext: output_path_no_ext.clone(),
        });

        if self.options.is_blob() {
            let blob_name = output_dir
                .join(&shader_name)
                .to_string_lossy()
                .into_owned();
            plan.blobs.entry(blob_name).or_default().push(BlobEntry {
                permutation_path_no_ext: output_path_no_ext,
                combined_defines,
            });
        }

        Ok(())
    }
}

/// Canonical combined form: lexicographically sorted, single-space
/// separated. Sorting makes the permutation name independent of declaration
/// order within a line.
pub fn combine_defines(defines: &[String]) -> String {
    let mut sorted = defines.to_vec();
    sorted.sort();
    sorted.join(" ")
}

/// 32-bit fold of the 64-bit hash of the combined defines, rendered as the
/// `_XXXXXXXX` permutation suffix. FxHasher keeps it stable across runs.
pub fn permutation_hash(combined_defines: &str) -> u32 {
    let mut hasher = FxHasher::default();
    hasher.write(combined_defines.as_bytes());
    let hash = hasher.finish();
    (hash as u32) ^ ((hash >> 32) as u32)
}

fn probe_artifact(
    path: &Path,
    enabled: bool,
    force: &mut bool,
    output_time: &mut Option<SystemTime>,
) {
    if !enabled || *force {
        return;
    }

    match mtime(path) {
        Ok(time) => {
            *output_time = Some(match *output_time {
                Some(existing) => existing.min(time),
                None => time,
            })
        }
        Err(_) => *force = true,
    }
}

fn mtime(path: &Path) -> std::io::Result<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn options_in(root: &Path) -> Options {
        Options {
            platform: Platform::Dxil,
            config_file: root.join("shaders.cfg"),
            source_dir: root.to_path_buf(),
            output_dir: root.join("out"),
            output_ext: String::from(".dxil"),
            ..Options::default()
        }
    }

    fn write_config(options: &Options, config: &str) {
        fs::write(&options.config_file, config).unwrap();
    }

    fn plan(options: &Options) -> Plan {
        Planner::new(options).unwrap().plan().unwrap()
    }

    #[test]
    fn dxbc_skips_unsupported_profiles() {
        let dir = TempDir::new().unwrap();
        let mut options = options_in(dir.path());
        options.platform = Platform::Dxbc;

        fs::write(dir.path().join("rt.hlsl"), "// rt\n").unwrap();
        fs::write(dir.path().join("mesh.hlsl"), "// mesh\n").unwrap();
        fs::write(dir.path().join("vs.hlsl"), "// vs\n").unwrap();
        write_config(
            &options,
            "rt.hlsl -T lib\nmesh.hlsl -T ms\nmesh.hlsl -T as\nvs.hlsl -T vs\n",
        );

        let plan = plan(&options);
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].profile, ShaderProfile::Vertex);
    }

    #[test]
    fn distinct_define_sets_get_distinct_suffixes() {
        let dir = TempDir::new().unwrap();
        let options = options_in(dir.path());

        fs::write(dir.path().join("s.hlsl"), "// s\n").unwrap();
        write_config(&options, "s.hlsl -T ps -D A={0,1} -D B={X,Y}\n");

        let plan = plan(&options);
        assert_eq!(plan.tasks.len(), 4);

        let mut outputs: Vec<_> = plan
            .tasks
            .iter()
            .map(|t| t.output_path_no_ext.clone())
            .collect();
        outputs.sort();
        outputs.dedup();
        assert_eq!(outputs.len(), 4, "output paths must not collide");
    }

    #[test]
    fn combined_defines_are_sorted() {
        assert_eq!(
            combine_defines(&[String::from("B=0"), String::from("A=1")]),
            "A=1 B=0"
        );
        // Same set in a different declaration order hashes identically.
        assert_eq!(
            permutation_hash("A=1 B=0"),
            permutation_hash(&combine_defines(&[String::from("A=1"), String::from("B=0")]))
        );
    }

    #[test]
    fn shader_names_reflect_entry_and_suffix() {
        let dir = TempDir::new().unwrap();
        let options = options_in(dir.path());

        let sub = dir.path().join("fx");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("blur.hlsl"), "// blur\n").unwrap();
        write_config(&options, "fx/blur.hlsl -T ps -E horizontal -s _hq\n");

        let plan = plan(&options);
        assert_eq!(
            plan.tasks[0].output_path_no_ext,
            dir.path().join("out/fx/blur_horizontal_hq")
        );
    }

    #[test]
    fn flatten_drops_source_directories() {
        let dir = TempDir::new().unwrap();
        let mut options = options_in(dir.path());
        options.flatten = true;

        let sub = dir.path().join("fx");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("blur.hlsl"), "// blur\n").unwrap();
        write_config(&options, "fx/blur.hlsl -T ps\n");

        let plan = plan(&options);
        assert_eq!(plan.tasks[0].output_path_no_ext, dir.path().join("out/blur"));
    }

    #[test]
    fn up_to_date_outputs_are_skipped() {
        let dir = TempDir::new().unwrap();
        let options = options_in(dir.path());

        fs::write(dir.path().join("s.hlsl"), "// s\n").unwrap();
        write_config(&options, "s.hlsl -T ps\n");

        // First plan builds: the output is missing.
        let first = plan(&options);
        assert_eq!(first.tasks.len(), 1);

        // Fake a compile newer than every input.
        let output = dir.path().join("out/s.dxil");
        fs::write(&output, b"blob").unwrap();
        let file = fs::OpenOptions::new().write(true).open(&output).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(3600))
            .unwrap();

        let second = plan(&options);
        assert!(second.tasks.is_empty(), "fresh outputs must not rebuild");

        // Deleting the artifact forces the task again.
        fs::remove_file(&output).unwrap();
        let third = plan(&options);
        assert_eq!(third.tasks.len(), 1);
    }

    #[test]
    fn stale_outputs_rebuild() {
        let dir = TempDir::new().unwrap();
        let options = options_in(dir.path());

        fs::write(dir.path().join("s.hlsl"), "// s\n").unwrap();
        write_config(&options, "s.hlsl -T ps\n");

        let out_dir = dir.path().join("out");
        fs::create_dir_all(&out_dir).unwrap();
        // Output older than the source.
        let output = out_dir.join("s.dxil");
        fs::write(&output, b"blob").unwrap();
        let file = fs::OpenOptions::new().write(true).open(&output).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1))
            .unwrap();

        let plan = plan(&options);
        assert_eq!(plan.tasks.len(), 1);
    }

    #[test]
    fn force_overrides_freshness() {
        let dir = TempDir::new().unwrap();
        let mut options = options_in(dir.path());
        options.force = true;

        fs::write(dir.path().join("s.hlsl"), "// s\n").unwrap();
        write_config(&options, "s.hlsl -T ps\n");

        let output = dir.path().join("out");
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("s.dxil"), b"blob").unwrap();
        let file = fs::OpenOptions::new()
            .write(true)
            .open(output.join("s.dxil"))
            .unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(3600))
            .unwrap();

        assert_eq!(plan(&options).tasks.len(), 1);
    }

    #[test]
    fn planning_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let mut options = options_in(dir.path());
        options.binary_blob = true;

        fs::write(dir.path().join("a.hlsl"), "// a\n").unwrap();
        fs::write(dir.path().join("b.hlsl"), "// b\n").unwrap();
        write_config(
            &options,
            "a.hlsl -T ps -D M={0,1}\nb.hlsl -T vs -D N={2,3}\n",
        );

        let first = plan(&options);
        let second = plan(&options);

        let paths = |p: &Plan| {
            p.tasks
                .iter()
                .map(|t| t.output_path_no_ext.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(paths(&first), paths(&second));

        let blobs = |p: &Plan| p.blobs.clone();
        assert_eq!(blobs(&first), blobs(&second));
    }

    #[test]
    fn blob_entries_keep_declaration_order() {
        let dir = TempDir::new().unwrap();
        let mut options = options_in(dir.path());
        options.binary_blob = true;

        fs::write(dir.path().join("s.hlsl"), "// s\n").unwrap();
        write_config(&options, "s.hlsl -T ps -D A={2,0,1}\n");

        let plan = plan(&options);
        let entries = plan.blobs.values().next().unwrap();
        let defines: Vec<_> = entries.iter().map(|e| e.combined_defines.clone()).collect();
        assert_eq!(defines, ["A=2", "A=0", "A=1"]);
    }

    #[test]
    fn per_line_optimization_override_is_clamped() {
        let dir = TempDir::new().unwrap();
        let options = options_in(dir.path());

        fs::write(dir.path().join("s.hlsl"), "// s\n").unwrap();
        write_config(&options, "s.hlsl -T ps -O 7\ns.hlsl -T vs\n");

        let plan = plan(&options);
        assert_eq!(plan.tasks[0].optimization_level, 3);
        assert_eq!(plan.tasks[1].optimization_level, options.optimization_level);
    }

    #[test]
    fn parse_errors_carry_the_config_prefix() {
        let dir = TempDir::new().unwrap();
        let options = options_in(dir.path());
        write_config(&options, "s.hlsl -T ps -D A={0\n");

        let err = Planner::new(&options).unwrap().plan().unwrap_err();
        let message = format!("{err}");
        assert!(message.contains("(1,0)"), "got: {message}");
    }
}
