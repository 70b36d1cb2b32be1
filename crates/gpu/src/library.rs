//! Named kernel sources.
//!
//! Sources are embedded with `include_str!` by the crates that own them and
//! registered here under their file name. When an override directory is set,
//! a file of the same name in it wins, which is how edited kernels are picked
//! up without rebuilding.

use std::{
    borrow::Cow,
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
};

use crate::GpuError;

const INCLUDE: &str = "#include";

#[derive(Debug, Clone)]
struct ProgramEntry {
    vertex: String,
    fragment: String,
}

#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    sources: BTreeMap<String, Cow<'static, str>>,
    programs: BTreeMap<String, ProgramEntry>,
    override_dir: Option<PathBuf>,
}

impl ShaderLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the embedded source `name`.
    pub fn register_source(&mut self, name: &str, source: impl Into<Cow<'static, str>>) -> &mut Self {
        self.sources.insert(name.to_owned(), source.into());
        self
    }

    /// Declares program `name` as the pair of sources `vertex` and `fragment`.
    pub fn register_program(&mut self, name: &str, vertex: &str, fragment: &str) -> &mut Self {
        self.programs.insert(
            name.to_owned(),
            ProgramEntry {
                vertex: vertex.to_owned(),
                fragment: fragment.to_owned(),
            },
        );
        self
    }

    pub fn set_override_dir(&mut self, dir: Option<PathBuf>) {
        if let Some(dir) = &dir {
            tracing::info!(dir = %dir.display(), "kernel sources may be overridden from disk");
        }
        self.override_dir = dir;
    }

    #[must_use]
    pub fn override_dir(&self) -> Option<&Path> {
        self.override_dir.as_deref()
    }

    pub fn program_names(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }

    #[must_use]
    pub fn has_program(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    /// Programs that read `source`, directly or through an include.
    #[must_use]
    pub fn programs_using(&self, source: &str) -> Vec<String> {
        self.programs
            .iter()
            .filter(|(_, entry)| {
                let mut seen = HashSet::new();
                self.reaches(&entry.vertex, source, &mut seen) || self.reaches(&entry.fragment, source, &mut seen)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn reaches(&self, from: &str, target: &str, seen: &mut HashSet<String>) -> bool {
        if from == target {
            return true;
        }
        if !seen.insert(from.to_owned()) {
            return false;
        }
        let Ok(text) = self.source(from) else {
            return false;
        };
        let includes: Vec<String> = text.lines().filter_map(include_target).map(str::to_owned).collect();
        includes.iter().any(|name| self.reaches(name, target, seen))
    }

    /// Text of source `name`, preferring the override directory.
    ///
    /// # Errors
    ///
    /// [`GpuError::Io`] when an override file exists but cannot be read,
    /// [`GpuError::UnknownKernel`] when nothing is registered under `name`.
    pub fn source(&self, name: &str) -> Result<Cow<'_, str>, GpuError> {
        if let Some(dir) = &self.override_dir {
            let path = dir.join(name);
            if path.is_file() {
                return std::fs::read_to_string(&path)
                    .map(Cow::Owned)
                    .map_err(|source| GpuError::Io {
                        path: path.display().to_string(),
                        source,
                    });
            }
        }
        self.sources
            .get(name)
            .map(|s| Cow::Borrowed(s.as_ref()))
            .ok_or_else(|| GpuError::UnknownKernel(name.to_owned()))
    }

    /// Vertex and fragment text of program `name` with includes expanded.
    ///
    /// Each included source is pasted at most once per program, so a helper
    /// file included by both stages is only defined once in the module.
    pub fn program_sources(&self, name: &str) -> Result<(String, String), GpuError> {
        let entry = self
            .programs
            .get(name)
            .ok_or_else(|| GpuError::UnknownKernel(name.to_owned()))?;
        let mut included = HashSet::new();
        let mut vertex = String::new();
        self.expand(&entry.vertex, &mut included, &mut vertex)?;
        let mut fragment = String::new();
        self.expand(&entry.fragment, &mut included, &mut fragment)?;
        Ok((vertex, fragment))
    }

    fn expand(&self, name: &str, included: &mut HashSet<String>, out: &mut String) -> Result<(), GpuError> {
        let text = self.source(name)?;
        for line in text.lines() {
            match include_target(line) {
                Some(target) => {
                    if included.insert(target.to_owned()) {
                        self.expand(target, included, out)?;
                    }
                    out.push('\n');
                }
                None => {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        Ok(())
    }
}

fn include_target(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix(INCLUDE)?
        .trim()
        .strip_prefix('"')?
        .strip_suffix('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> ShaderLibrary {
        let mut library = ShaderLibrary::new();
        library
            .register_source("common.wgsl", "fn helper() -> f32 { return 1.0; }")
            .register_source("a.vert.wgsl", "#include \"common.wgsl\"\nfn vs() {}")
            .register_source("a.frag.wgsl", "#include \"common.wgsl\"\nfn fs() {}")
            .register_source("b.frag.wgsl", "fn other() {}")
            .register_program("a", "a.vert.wgsl", "a.frag.wgsl")
            .register_program("b", "a.vert.wgsl", "b.frag.wgsl");
        library
    }

    #[test]
    fn includes_expand_once_per_program() {
        let (vertex, fragment) = library().program_sources("a").unwrap();
        assert!(vertex.contains("fn helper()"));
        assert!(!fragment.contains("fn helper()"));
        assert!(fragment.contains("fn fs()"));
    }

    #[test]
    fn unknown_names_are_reported() {
        let library = library();
        assert!(matches!(library.program_sources("missing"), Err(GpuError::UnknownKernel(n)) if n == "missing"));
        let mut broken = library.clone();
        broken.register_source("c.wgsl", "#include \"nope.wgsl\"");
        broken.register_program("c", "c.wgsl", "b.frag.wgsl");
        assert!(matches!(broken.program_sources("c"), Err(GpuError::UnknownKernel(n)) if n == "nope.wgsl"));
    }

    #[test]
    fn dependents_follow_includes() {
        let library = library();
        assert_eq!(library.programs_using("common.wgsl"), ["a", "b"]);
        assert_eq!(library.programs_using("b.frag.wgsl"), ["b"]);
        assert!(library.programs_using("unrelated.wgsl").is_empty());
    }

    #[test]
    fn override_directory_wins() {
        let dir = std::env::temp_dir().join(format!("water-gpu-library-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("b.frag.wgsl"), "fn replaced() {}").unwrap();

        let mut library = library();
        library.set_override_dir(Some(dir.clone()));
        assert_eq!(library.source("b.frag.wgsl").unwrap(), "fn replaced() {}");
        assert!(library.source("common.wgsl").unwrap().contains("helper"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
