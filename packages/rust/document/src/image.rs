//! Image header probing for package icons and screenshots.

use std::path::Path;

use tracing::debug;

use crate::model::{ImageMetadata, Manifest};

/// Fill in [`crate::model::Image::metadata`] for every icon and screenshot of `manifest`,
/// package-level and per policy template.
pub fn probe_manifest_images(dir: &Path, manifest: &mut Manifest) {
    let templates = manifest
        .policy_templates
        .iter_mut()
        .flat_map(|pt| pt.icons.iter_mut().chain(pt.screenshots.iter_mut()));
    for image in manifest
        .icons
        .iter_mut()
        .chain(manifest.screenshots.iter_mut())
        .chain(templates)
    {
        image.metadata = read_image_metadata(dir, &image.src);
    }
}

/// Width, height and byte size of the image at `src`, relative to the package
/// directory. `None` when the file is missing or not a raster format we can
/// read a header from (e.g. SVG).
pub fn read_image_metadata(dir: &Path, src: &str) -> Option<ImageMetadata> {
    let rel = src.trim_start_matches('/');
    if rel.is_empty() {
        return None;
    }
    let path = dir.join(rel);
    let byte_size = std::fs::metadata(&path).ok()?.len();
    match imagesize::size(&path) {
        Ok(size) => Some(ImageMetadata {
            width: size.width as u64,
            height: size.height as u64,
            byte_size,
        }),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no image header");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::parse_str;
    use pretty_assertions::assert_eq;

    /// PNG signature plus an IHDR chunk: enough for a header read.
    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes
    }

    #[test]
    fn reads_png_header_and_size() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("img")).unwrap();
        let data = png(32, 16);
        std::fs::write(tmp.path().join("img/logo.png"), &data).unwrap();

        let meta = read_image_metadata(tmp.path(), "/img/logo.png").unwrap();
        assert_eq!(
            meta,
            ImageMetadata {
                width: 32,
                height: 16,
                byte_size: data.len() as u64,
            }
        );
    }

    #[test]
    fn missing_or_unreadable_images_have_no_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("logo.svg"), "<svg xmlns=\"http://www.w3.org/2000/svg\"/>").unwrap();
        assert_eq!(read_image_metadata(tmp.path(), "/logo.svg"), None);
        assert_eq!(read_image_metadata(tmp.path(), "/img/missing.png"), None);
        assert_eq!(read_image_metadata(tmp.path(), ""), None);
    }

    #[test]
    fn probes_package_and_template_images() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("img")).unwrap();
        std::fs::write(tmp.path().join("img/icon.png"), png(64, 64)).unwrap();
        std::fs::write(tmp.path().join("img/shot.png"), png(1920, 1080)).unwrap();

        let doc = parse_str(
            "manifest.yml",
            r#"name: nginx
icons:
  - src: /img/icon.png
    type: image/png
policy_templates:
  - name: nginx
    screenshots:
      - src: /img/shot.png
        type: image/png
"#,
        )
        .unwrap();
        let mut manifest = Manifest::from_node(&doc).unwrap();
        probe_manifest_images(tmp.path(), &mut manifest);

        assert_eq!(manifest.icons[0].metadata.map(|m| m.width), Some(64));
        let shot = manifest.policy_templates[0].screenshots[0].metadata.unwrap();
        assert_eq!((shot.width, shot.height), (1920, 1080));
    }
}
