// thumbkit/src/processors/metadata.rs
//! EXIF / XMP / IPTC carry-over.
//!
//! Payloads are handled as opaque byte blocks. EXIF is located with
//! `kamadak-exif` (JPEG, TIFF, PNG, WebP, HEIF containers). XMP and IPTC are
//! read from JPEG APP1 / APP13 segments and PNG `iTXt` chunks. Write-back
//! goes through `img_parts`: EXIF into JPEG, PNG and WebP; XMP into JPEG and
//! PNG; IPTC into JPEG only.

use crate::core::{Result, ThumbError};
use exif::Reader;
use img_parts::jpeg::{markers, Jpeg, JpegSegment};
use img_parts::png::{Png, PngChunk};
use img_parts::{Bytes, DynImage, ImageEXIF};
use std::io::Cursor;
use std::path::Path;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";

/// `iTXt` keyword, then compression flag, method, empty language and
/// translated keyword.
const PNG_XMP_PREFIX: &[u8] = b"XML:com.adobe.xmp\0\0\0\0\0";
const PNG_ITXT: [u8; 4] = *b"iTXt";
const PNG_IDAT: [u8; 4] = *b"IDAT";

const MAX_SEGMENT_PAYLOAD: usize = 0xFFFF - 2;

/// Metadata blocks lifted from a source file.
///
/// - `exif`: raw TIFF-structured EXIF data (no `Exif\0\0` prefix)
/// - `xmp`: XMP packet
/// - `iptc`: APP13 Photoshop resource block, including its header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataBundle {
    pub exif: Option<Vec<u8>>,
    pub xmp: Option<Vec<u8>>,
    pub iptc: Option<Vec<u8>>,
}

impl MetadataBundle {
    pub fn is_empty(&self) -> bool {
        self.exif.is_none() && self.xmp.is_none() && self.iptc.is_none()
    }
}

/// Metadata read/write collaborator.
pub trait MetadataStore: Send + Sync {
    fn read_metadata(&self, path: &Path) -> Result<MetadataBundle>;

    fn write_metadata(&self, path: &Path, bundle: &MetadataBundle) -> Result<()>;
}

pub struct MetadataProcessor;

impl MetadataProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn read_from_bytes(&self, data: &[u8]) -> MetadataBundle {
        let mut bundle = MetadataBundle::default();

        match Reader::new().read_from_container(&mut Cursor::new(data)) {
            Ok(exif) => {
                log::debug!("Found EXIF data ({} bytes)", exif.buf().len());
                bundle.exif = Some(exif.buf().to_vec());
            }
            Err(exif::Error::NotFound(_)) => log::debug!("No EXIF data found"),
            Err(e) => log::warn!("Failed to read EXIF: {}", e),
        }

        match DynImage::from_bytes(Bytes::copy_from_slice(data)) {
            Ok(Some(DynImage::Jpeg(jpeg))) => {
                for segment in jpeg.segments() {
                    let payload = segment.contents();
                    if segment.marker() == markers::APP1 && payload.starts_with(XMP_HEADER) {
                        bundle.xmp = Some(payload[XMP_HEADER.len()..].to_vec());
                    } else if segment.marker() == markers::APP13
                        && payload.starts_with(PHOTOSHOP_HEADER)
                    {
                        bundle.iptc = Some(payload.to_vec());
                    }
                }
            }
            Ok(Some(DynImage::Png(png))) => {
                bundle.xmp = png
                    .chunks()
                    .iter()
                    .find(|chunk| is_png_xmp(chunk))
                    .map(|chunk| chunk.contents()[PNG_XMP_PREFIX.len()..].to_vec());
            }
            Ok(_) => {}
            Err(e) => log::debug!("Container not parsed for XMP/IPTC: {}", e),
        }

        bundle
    }

    /// Rewrite encoded image `data` with the blocks from `bundle`, replacing
    /// any existing blocks of the same kind.
    pub fn embed(&self, data: &[u8], bundle: &MetadataBundle) -> Result<Vec<u8>> {
        let image = DynImage::from_bytes(Bytes::copy_from_slice(data))
            .map_err(|e| ThumbError::Metadata(format!("Could not parse image container: {}", e)))?
            .ok_or_else(|| {
                ThumbError::Metadata("Metadata write-back needs a JPEG, PNG or WebP file".to_string())
            })?;

        let mut out = Vec::with_capacity(data.len());
        match image {
            DynImage::Jpeg(mut jpeg) => {
                embed_jpeg(&mut jpeg, bundle)?;
                jpeg.encoder().write_to(&mut out)?;
            }
            DynImage::Png(mut png) => {
                embed_png(&mut png, bundle);
                png.encoder().write_to(&mut out)?;
            }
            DynImage::WebP(mut webp) => {
                if let Some(exif) = &bundle.exif {
                    webp.set_exif(Some(Bytes::copy_from_slice(exif)));
                }
                if bundle.xmp.is_some() || bundle.iptc.is_some() {
                    log::debug!("XMP/IPTC are not carried into WebP output");
                }
                webp.encoder().write_to(&mut out)?;
            }
        }

        Ok(out)
    }
}

impl MetadataStore for MetadataProcessor {
    fn read_metadata(&self, path: &Path) -> Result<MetadataBundle> {
        let data = std::fs::read(path)?;
        let bundle = self.read_from_bytes(&data);
        log::debug!(
            "Metadata for {}: exif={} xmp={} iptc={}",
            path.display(),
            bundle.exif.is_some(),
            bundle.xmp.is_some(),
            bundle.iptc.is_some()
        );
        Ok(bundle)
    }

    fn write_metadata(&self, path: &Path, bundle: &MetadataBundle) -> Result<()> {
        let data = std::fs::read(path)?;
        let rewritten = self.embed(&data, bundle).map_err(|e| match e {
            ThumbError::Metadata(message) => {
                ThumbError::Metadata(format!("{}: {}", message, path.display()))
            }
            other => other,
        })?;
        std::fs::write(path, rewritten)?;
        log::debug!("Wrote metadata to {}", path.display());
        Ok(())
    }
}

impl Default for MetadataProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn embed_jpeg(jpeg: &mut Jpeg, bundle: &MetadataBundle) -> Result<()> {
    let oversized = [
        bundle.exif.as_ref().map(|b| b.len() + EXIF_HEADER.len()),
        bundle.xmp.as_ref().map(|b| b.len() + XMP_HEADER.len()),
        bundle.iptc.as_ref().map(Vec::len),
    ]
    .into_iter()
    .flatten()
    .find(|len| *len > MAX_SEGMENT_PAYLOAD);

    if let Some(len) = oversized {
        return Err(ThumbError::Metadata(format!(
            "Metadata block of {} bytes does not fit in a JPEG segment",
            len
        )));
    }

    if let Some(exif) = &bundle.exif {
        jpeg.set_exif(Some(Bytes::copy_from_slice(exif)));
    }
    if let Some(xmp) = &bundle.xmp {
        replace_jpeg_segment(jpeg, markers::APP1, XMP_HEADER, [XMP_HEADER, xmp.as_slice()].concat());
    }
    if let Some(iptc) = &bundle.iptc {
        replace_jpeg_segment(jpeg, markers::APP13, PHOTOSHOP_HEADER, iptc.clone());
    }
    Ok(())
}

/// Drop segments of `marker` starting with `prefix`, then insert `contents`
/// after the leading APP0/APP1 header segments.
fn replace_jpeg_segment(jpeg: &mut Jpeg, marker: u8, prefix: &[u8], contents: Vec<u8>) {
    let segments = jpeg.segments_mut();
    segments.retain(|s| !(s.marker() == marker && s.contents().starts_with(prefix)));

    let at = segments
        .iter()
        .take_while(|s| s.marker() == markers::APP0 || s.marker() == markers::APP1)
        .count();
    segments.insert(at, JpegSegment::new_with_contents(marker, Bytes::from(contents)));
}

fn embed_png(png: &mut Png, bundle: &MetadataBundle) {
    if let Some(exif) = &bundle.exif {
        png.set_exif(Some(Bytes::copy_from_slice(exif)));
    }

    if let Some(xmp) = &bundle.xmp {
        let chunks = png.chunks_mut();
        chunks.retain(|chunk| !is_png_xmp(chunk));
        let at = chunks
            .iter()
            .position(|chunk| chunk.kind() == PNG_IDAT)
            .unwrap_or(chunks.len());
        let contents = [PNG_XMP_PREFIX, xmp.as_slice()].concat();
        chunks.insert(at, PngChunk::new(PNG_ITXT, Bytes::from(contents)));
    }

    if bundle.iptc.is_some() {
        log::debug!("IPTC is not carried into PNG output");
    }
}

fn is_png_xmp(chunk: &PngChunk) -> bool {
    chunk.kind() == PNG_ITXT && chunk.contents().starts_with(PNG_XMP_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutputFormat;
    use crate::processors::Compressor;
    use image::{DynamicImage, Rgb, RgbImage};

    /// Little-endian TIFF with a single Orientation = 6 entry.
    const TIFF_ORIENTATION: [u8; 26] = [
        b'I', b'I', 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00, // header
        0x01, 0x00, // one entry
        0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, // no next IFD
    ];

    fn encoded(format: OutputFormat) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([10, 200, 30])));
        Compressor::default()
            .with_png_optimization(false)
            .encode(&image, format)
            .unwrap()
    }

    fn jpeg() -> Vec<u8> {
        encoded(OutputFormat::Jpeg)
    }

    fn bundle() -> MetadataBundle {
        MetadataBundle {
            exif: Some(TIFF_ORIENTATION.to_vec()),
            xmp: Some(b"<x:xmpmeta/>".to_vec()),
            iptc: Some([PHOTOSHOP_HEADER, &b"8BIM\x04\x04\0\0\0\0\0\0"[..]].concat()),
        }
    }

    #[test]
    fn plain_jpeg_has_no_metadata() {
        assert!(MetadataProcessor::new().read_from_bytes(&jpeg()).is_empty());
    }

    #[test]
    fn embedded_blocks_read_back() {
        let processor = MetadataProcessor::new();
        let tagged = processor.embed(&jpeg(), &bundle()).unwrap();

        assert_eq!(processor.read_from_bytes(&tagged), bundle());
        // Still a decodable image.
        let decoded = image::load_from_memory(&tagged).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }

    #[test]
    fn embedding_twice_replaces_blocks() {
        let processor = MetadataProcessor::new();
        let once = processor.embed(&jpeg(), &bundle()).unwrap();
        let twice = processor.embed(&once, &bundle()).unwrap();

        let jpeg = Jpeg::from_bytes(Bytes::from(twice.clone())).unwrap();
        let count = |marker: u8| jpeg.segments().iter().filter(|s| s.marker() == marker).count();
        // EXIF + XMP, and one Photoshop block.
        assert_eq!(count(markers::APP1), 2);
        assert_eq!(count(markers::APP13), 1);
        assert_eq!(processor.read_from_bytes(&twice), bundle());
    }

    #[test]
    fn png_carries_exif_and_xmp() {
        let processor = MetadataProcessor::new();
        let tagged = processor.embed(&encoded(OutputFormat::Png), &bundle()).unwrap();

        let read = processor.read_from_bytes(&tagged);
        assert_eq!(read.exif, bundle().exif);
        assert_eq!(read.xmp, bundle().xmp);
        assert_eq!(read.iptc, None);

        let decoded = image::load_from_memory(&tagged).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }

    #[test]
    fn webp_carries_exif() {
        let tagged = MetadataProcessor::new()
            .embed(&encoded(OutputFormat::WebP), &bundle())
            .unwrap();

        let webp = img_parts::webp::WebP::from_bytes(Bytes::from(tagged)).unwrap();
        assert_eq!(webp.exif().map(|e| e.to_vec()), bundle().exif);
    }

    #[test]
    fn write_back_rejects_unsupported_containers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bmp");
        let image = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
        Compressor::default().save(&image, &path).unwrap();

        let err = MetadataProcessor::new()
            .write_metadata(&path, &bundle())
            .unwrap_err();
        assert!(matches!(err, ThumbError::Metadata(_)));
        assert!(MetadataProcessor::new().embed(b"GIF89a", &bundle()).is_err());
    }

    #[test]
    fn write_back_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        for (name, format) in [("out.jpg", OutputFormat::Jpeg), ("out.png", OutputFormat::Png)] {
            let path = dir.path().join(name);
            std::fs::write(&path, encoded(format)).unwrap();

            let processor = MetadataProcessor::new();
            let only_exif = MetadataBundle {
                exif: Some(TIFF_ORIENTATION.to_vec()),
                ..Default::default()
            };
            processor.write_metadata(&path, &only_exif).unwrap();
            assert_eq!(processor.read_metadata(&path).unwrap(), only_exif);
        }
    }

    #[test]
    fn oversized_jpeg_block_is_rejected() {
        let huge = MetadataBundle {
            xmp: Some(vec![b'x'; MAX_SEGMENT_PAYLOAD]),
            ..Default::default()
        };
        let err = MetadataProcessor::new().embed(&jpeg(), &huge).unwrap_err();
        assert!(err.to_string().contains("does not fit"));
    }
}
