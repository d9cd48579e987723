use anyhow::{Context, Result};
use dotmatrix_core::types::Frame;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Write an ARGB8888 frame as an 8-bit RGB PNG.
pub fn save_png(path: &Path, frame: &Frame) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);

    let rgb: Vec<u8> = frame
        .pixels
        .iter()
        .flat_map(|&p| [(p >> 16) as u8, (p >> 8) as u8, p as u8])
        .collect();

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&rgb)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_round_trip() {
        let mut frame = Frame::new(160, 144);
        frame.pixels.fill(0xFFFFFFFF);
        frame.pixels[0] = 0xFF112233;

        let path = std::env::temp_dir().join(format!("dotmatrix_shot_{}.png", std::process::id()));
        save_png(&path, &frame).unwrap();

        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!((info.width, info.height), (160, 144));
        assert_eq!(info.color_type, png::ColorType::Rgb);
        assert_eq!(&buf[..6], &[0x11, 0x22, 0x33, 0xFF, 0xFF, 0xFF]);

        std::fs::remove_file(path).ok();
    }
}
