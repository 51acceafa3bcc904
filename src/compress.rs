use std::path::{Path, PathBuf};

use crate::cmd::{Tool, Tools};
use crate::error::Result;

/// `<dir>/<stem>.zip` for `<dir>/<stem>.<ext>`
pub fn zip_path(image: &Path) -> PathBuf {
    image.with_extension("zip")
}

/// Compress `image` into a zip archive next to it. An existing archive at
/// that path is updated in place by `zip`; asking first is up to the caller.
///
/// The uncompressed image is left alone. Returns the archive path.
pub fn compress(tools: &Tools, image: &Path) -> Result<PathBuf> {
    let archive = zip_path(image);
    tracing::info!("Compressing {} into {}", image.display(), archive.display());
    tools.run(Tool::Zip, [archive.as_os_str(), image.as_os_str()])?;
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::fs;

    #[test]
    fn archive_name_replaces_last_extension() {
        assert_eq!(
            zip_path(Path::new("/data/raspios_nfsroot.img")),
            PathBuf::from("/data/raspios_nfsroot.zip")
        );
        assert_eq!(
            zip_path(Path::new("2021-05-07-raspios.buster.img")),
            PathBuf::from("2021-05-07-raspios.buster.zip")
        );
        assert_eq!(zip_path(Path::new("raspios")), PathBuf::from("raspios.zip"));
    }

    #[test]
    fn runs_zip_with_archive_then_image() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("raspios.img");
        fs::write(&image, b"image").unwrap();
        let tools = Tools::default().stub(Tool::Zip, "cat \"$2\" > \"$1\"");

        let archive = compress(&tools, &image).unwrap();
        assert_eq!(archive, dir.path().join("raspios.zip"));
        assert_eq!(fs::read(&archive).unwrap(), b"image");
        assert!(image.exists());
    }

    #[test]
    fn zip_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("raspios.img");
        let tools = Tools::default().stub(Tool::Zip, "exit 12");

        let err = compress(&tools, &image).unwrap_err();
        assert!(matches!(err, Error::Command { code: Some(12), .. }));
    }
}
