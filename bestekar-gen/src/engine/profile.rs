//! Voice profile storage and acquisition
//!
//! A voice profile is a paired model (`.pth`) and feature index
//! (`.index`) file identifying a target singing voice. Profiles live
//! under `<root>/models/` and `<root>/indices/` with matching base
//! names.
//!
//! When no profile exists, a default is fetched from a list of mirrors
//! tried in order. If every mirror fails, placeholder marker files are
//! written so later runs skip the network entirely and treat conversion
//! as unavailable.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use bestekar_common::fallback::FallbackChain;

use crate::error::{Error, Result};

/// First line of placeholder marker files.
const PLACEHOLDER_HEADER: &str = "# bestekar placeholder profile";

/// Base name used for the acquired default profile.
const DEFAULT_PROFILE_NAME: &str = "turkish_female";

/// A resolved voice profile on disk.
#[derive(Debug, Clone)]
pub struct VoiceProfile {
    pub model_path: PathBuf,
    pub index_path: Option<PathBuf>,
}

impl VoiceProfile {
    /// Profile from an explicitly supplied model path; the index is
    /// optional in this case.
    pub fn from_model_path(model_path: PathBuf) -> Self {
        Self {
            model_path,
            index_path: None,
        }
    }

    /// True when the model file is a placeholder marker written after a
    /// failed acquisition.
    pub fn is_placeholder(&self) -> bool {
        let mut header = vec![0u8; PLACEHOLDER_HEADER.len()];
        match fs::File::open(&self.model_path).and_then(|mut f| f.read_exact(&mut header)) {
            Ok(()) => header == PLACEHOLDER_HEADER.as_bytes(),
            Err(_) => false,
        }
    }

    /// True when the profile can actually drive a conversion.
    pub fn is_usable(&self) -> bool {
        self.model_path.exists() && !self.is_placeholder()
    }
}

/// One remote source for the default profile.
#[derive(Debug, Clone)]
pub struct ProfileMirror {
    pub name: String,
    pub model_url: String,
    pub index_url: String,
}

/// Default mirror list for the Turkish female voice profile.
pub fn default_mirrors() -> Vec<ProfileMirror> {
    vec![
        ProfileMirror {
            name: "TITAN Base Model".to_string(),
            model_url: "https://huggingface.co/blaise-tk/TITAN/resolve/main/G_48000.pth"
                .to_string(),
            index_url:
                "https://huggingface.co/blaise-tk/TITAN/resolve/main/added_IVF256_Flat_nprobe_1.index"
                    .to_string(),
        },
        ProfileMirror {
            name: "RVC Pretrained v2".to_string(),
            model_url:
                "https://huggingface.co/lj1995/VoiceConversionWebUI/resolve/main/pretrained_v2/G_48000.pth"
                    .to_string(),
            index_url:
                "https://huggingface.co/lj1995/VoiceConversionWebUI/resolve/main/pretrained_v2/added_IVF256_Flat_nprobe_1.index"
                    .to_string(),
        },
    ]
}

/// On-disk profile library rooted at a profiles folder.
#[derive(Debug, Clone)]
pub struct ProfileLibrary {
    root: PathBuf,
}

impl ProfileLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    fn indices_dir(&self) -> PathBuf {
        self.root.join("indices")
    }

    /// Create the directory layout and drop a README explaining it.
    pub fn ensure_layout(&self) -> Result<()> {
        fs::create_dir_all(self.models_dir())?;
        fs::create_dir_all(self.indices_dir())?;

        let readme = self.root.join("README.md");
        if !readme.exists() {
            fs::write(
                &readme,
                "# Voice Profiles\n\n\
                 Voice conversion models for singing voice generation.\n\n\
                 ## Structure\n\
                 - `models/` - .pth model files\n\
                 - `indices/` - .index feature files\n\n\
                 ## Adding Custom Models\n\
                 1. Place .pth model files in `models/`\n\
                 2. Place corresponding .index files in `indices/`\n\
                 3. Use matching file names (e.g. `singer.pth` and `singer.index`)\n\n\
                 A default Turkish female voice profile is downloaded automatically\n\
                 when none exists.\n",
            )?;
        }
        Ok(())
    }

    /// Look for an existing profile: the first model file, paired with
    /// the index of the same base name when present, otherwise any
    /// available index.
    pub fn find_existing(&self) -> Option<VoiceProfile> {
        let models = sorted_files_with_extension(&self.models_dir(), "pth");
        let indices = sorted_files_with_extension(&self.indices_dir(), "index");

        let model_path = models.into_iter().next()?;
        if indices.is_empty() {
            return None;
        }

        let stem = model_path.file_stem()?.to_os_string();
        let matching = self.indices_dir().join(format!("{}.index", stem.to_string_lossy()));
        let index_path = if matching.exists() {
            matching
        } else {
            indices.into_iter().next()?
        };

        Some(VoiceProfile {
            model_path,
            index_path: Some(index_path),
        })
    }

    /// Return a default profile, downloading one if necessary.
    ///
    /// Mirrors are tried in order; when all of them fail, placeholder
    /// markers are written and returned so subsequent calls do not touch
    /// the network again. Callers must check [`VoiceProfile::is_usable`].
    pub fn acquire_default(&self, mirrors: &[ProfileMirror]) -> Result<VoiceProfile> {
        self.ensure_layout()?;

        if let Some(profile) = self.find_existing() {
            info!("Voice profile already present: {}", profile.model_path.display());
            return Ok(profile);
        }

        let mut chain = FallbackChain::new("default voice profile");
        for mirror in mirrors {
            let mirror = mirror.clone();
            let library = self.clone();
            chain = chain.attempt(mirror.name.clone(), move || library.download(&mirror));
        }

        match chain.run() {
            Ok(chosen) => {
                info!("Voice profile downloaded via {}", chosen.strategy);
                Ok(chosen.value)
            }
            Err(exhausted) => {
                warn!("{}; writing placeholder profile", exhausted);
                self.write_placeholder()
            }
        }
    }

    fn profile_paths(&self) -> (PathBuf, PathBuf) {
        (
            self.models_dir().join(format!("{}.pth", DEFAULT_PROFILE_NAME)),
            self.indices_dir().join(format!("{}.index", DEFAULT_PROFILE_NAME)),
        )
    }

    fn download(&self, mirror: &ProfileMirror) -> anyhow::Result<VoiceProfile> {
        let (model_path, index_path) = self.profile_paths();
        info!("Downloading voice profile from {}", mirror.name);

        let result = (|| -> anyhow::Result<()> {
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?;
            download_file(&client, &mirror.model_url, &model_path)?;
            download_file(&client, &mirror.index_url, &index_path)?;
            Ok(())
        })();

        if let Err(e) = result {
            // Remove partial files so a later attempt starts clean
            let _ = fs::remove_file(&model_path);
            let _ = fs::remove_file(&index_path);
            return Err(e);
        }

        Ok(VoiceProfile {
            model_path,
            index_path: Some(index_path),
        })
    }

    fn write_placeholder(&self) -> Result<VoiceProfile> {
        let (model_path, index_path) = self.profile_paths();
        fs::write(
            &model_path,
            format!(
                "{}\n# Replace with a real .pth model file\n# Sources: https://huggingface.co/models?search=rvc\n",
                PLACEHOLDER_HEADER
            ),
        )?;
        fs::write(
            &index_path,
            format!(
                "{}\n# Replace with the .index file generated alongside the model\n",
                PLACEHOLDER_HEADER
            ),
        )?;
        info!("Placeholder profile files created");
        Ok(VoiceProfile {
            model_path,
            index_path: Some(index_path),
        })
    }
}

fn download_file(client: &reqwest::blocking::Client, url: &str, path: &Path) -> anyhow::Result<()> {
    let response = client.get(url).send()?.error_for_status()?;
    let bytes = response.bytes()?;
    fs::write(path, &bytes)?;
    Ok(())
}

fn sorted_files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == extension).unwrap_or(false))
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}
