//! Plain TIFF I/O via the `tiff` crate.
//!
//! - Reading: every page of the file contributes its samples as bands
//!   (pixel-interleaved samples are split into separate bands).
//! - Writing images: one `Gray64Float` page per band.
//! - Writing labels: a single `Gray32` page.

use crate::error::{Error, Result};
use crate::raster::{Image, Raster};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32, Gray64Float};
use tiff::encoder::TiffEncoder;

/// Read a TIFF file into a multi-band image
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<Image> {
    let file = File::open(path.as_ref())?;
    decode_image(file)
}

/// Read a TIFF from an in-memory buffer
pub fn read_image_from_buffer(data: &[u8]) -> Result<Image> {
    decode_image(Cursor::new(data))
}

fn decode_image<R: Read + Seek>(reader: R) -> Result<Image> {
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let mut bands = Vec::new();
    loop {
        let (width, height) = decoder
            .dimensions()
            .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
        let rows = height as usize;
        let cols = width as usize;

        let result = decoder
            .read_image()
            .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;
        let samples = to_f64(result)?;
        bands.extend(deinterleave(samples, rows, cols)?);

        if !decoder.more_images() {
            break;
        }
        decoder
            .next_image()
            .map_err(|e| Error::Other(format!("Cannot advance to next page: {}", e)))?;
    }

    Image::from_bands(bands)
}

fn to_f64(result: DecodingResult) -> Result<Vec<f64>> {
    let data = match result {
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };
    Ok(data)
}

/// Split pixel-interleaved samples into one raster per sample
fn deinterleave(samples: Vec<f64>, rows: usize, cols: usize) -> Result<Vec<Raster<f64>>> {
    let pixels = rows * cols;
    if pixels == 0 || samples.len() % pixels != 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    let per_pixel = samples.len() / pixels;
    if per_pixel == 1 {
        return Ok(vec![Raster::from_vec(samples, rows, cols)?]);
    }

    (0..per_pixel)
        .map(|s| {
            let band: Vec<f64> = samples.iter().skip(s).step_by(per_pixel).copied().collect();
            Raster::from_vec(band, rows, cols)
        })
        .collect()
}

/// Write every band of an image as a 64-bit float page
pub fn write_image<P: AsRef<Path>>(image: &Image, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    encode_image(image, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Encode an image to an in-memory TIFF buffer
pub fn write_image_to_buffer(image: &Image) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_image(image, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_image<W: Write + Seek>(image: &Image, writer: W) -> Result<()> {
    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;
    let (rows, cols) = image.shape();

    for band in image.bands() {
        let data: Vec<f64> = band.data().iter().copied().collect();
        encoder
            .write_image::<Gray64Float>(cols as u32, rows as u32, &data)
            .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;
    }
    Ok(())
}

/// Write a label grid as a 32-bit unsigned TIFF
pub fn write_labels<P: AsRef<Path>>(labels: &Raster<u32>, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    encode_labels(labels, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Encode a label grid to an in-memory TIFF buffer
pub fn write_labels_to_buffer(labels: &Raster<u32>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_labels(labels, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_labels<W: Write + Seek>(labels: &Raster<u32>, writer: W) -> Result<()> {
    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;
    let (rows, cols) = labels.shape();
    let data: Vec<u32> = labels.data().iter().copied().collect();

    encoder
        .write_image::<Gray32>(cols as u32, rows as u32, &data)
        .map_err(|e| Error::Other(format!("Cannot write label data: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::PixelGrid;

    #[test]
    fn test_image_buffer_roundtrip_multiband() {
        let a = Raster::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
        let b = Raster::filled(2, 3, -0.5);
        let img = Image::from_bands(vec![a, b]).unwrap();

        let buf = write_image_to_buffer(&img).unwrap();
        let back = read_image_from_buffer(&buf).unwrap();

        assert_eq!(back.n_bands(), 2);
        assert_eq!(back.shape(), (2, 3));
        assert_eq!(back.get(1, 2, 0), Some(6.0));
        assert_eq!(back.get(0, 0, 1), Some(-0.5));
    }

    #[test]
    fn test_labels_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.tif");
        let labels = Raster::from_vec(vec![0u32, 1, 1, 2], 2, 2).unwrap();

        write_labels(&labels, &path).unwrap();
        let back = read_image(&path).unwrap();
        assert_eq!(back.get(1, 1, 0), Some(2.0));
        assert_eq!(back.get(0, 0, 0), Some(0.0));
    }

    #[test]
    fn test_deinterleave_rgb() {
        let samples = vec![1.0, 10.0, 100.0, 2.0, 20.0, 200.0];
        let bands = deinterleave(samples, 1, 2).unwrap();
        assert_eq!(bands.len(), 3);
        assert_eq!(bands[1].get(0, 1).unwrap(), 20.0);
        assert_eq!(bands[2].get(0, 0).unwrap(), 100.0);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(read_image("/nonexistent/x.tif"), Err(Error::Io(_))));
    }
}
