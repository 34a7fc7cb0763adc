//! QR codes for the access URL.
//!
//! This module renders the network URL (token included) as a QR code, either
//! for the terminal using Unicode block characters or as a PNG image for the
//! web UI and for `lanshare qr --output`.

use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{ImageBuffer, Luma};
use qrcode::QrCode;

/// Pixels per QR module in PNG output.
const PNG_MODULE_SIZE: u32 = 10;

/// Quiet zone width in modules for PNG output.
const PNG_QUIET_ZONE: u32 = 4;

/// Generates a terminal-displayable QR code using Unicode block characters.
///
/// Two module rows are packed into each text row:
/// - Upper half block (U+2580): dark module on top, light below
/// - Lower half block (U+2584): light module on top, dark below
/// - Full block (U+2588): two dark modules
/// - Space: two light modules
///
/// # Errors
/// Returns an error if `data` does not fit in a QR code.
pub fn generate_terminal_qr(data: &str) -> anyhow::Result<String> {
    let code = QrCode::new(data.as_bytes())?;
    let modules = code.to_colors();
    let width = code.width();

    let mut output = String::new();

    // Add quiet zone (top border)
    let full_width = width + 8; // 4 modules quiet zone on each side
    for _ in 0..2 {
        output.push_str(&" ".repeat(full_width));
        output.push('\n');
    }

    let height = modules.len() / width;
    let mut row = 0;
    while row < height {
        output.push_str("    ");

        for col in 0..width {
            let top_dark = modules[row * width + col] == qrcode::Color::Dark;
            let bottom_dark =
                row + 1 < height && modules[(row + 1) * width + col] == qrcode::Color::Dark;

            let ch = match (top_dark, bottom_dark) {
                (true, true) => '\u{2588}',
                (true, false) => '\u{2580}',
                (false, true) => '\u{2584}',
                (false, false) => ' ',
            };
            output.push(ch);
        }

        output.push_str("    ");
        output.push('\n');
        row += 2;
    }

    for _ in 0..2 {
        output.push_str(&" ".repeat(full_width));
        output.push('\n');
    }

    Ok(output)
}

fn render_image(data: &str) -> anyhow::Result<ImageBuffer<Luma<u8>, Vec<u8>>> {
    let code = QrCode::new(data.as_bytes())?;
    let modules = code.to_colors();
    let qr_width = code.width();

    let quiet_zone_pixels = PNG_QUIET_ZONE * PNG_MODULE_SIZE;
    let qr_pixels = qr_width as u32 * PNG_MODULE_SIZE;
    let image_size = qr_pixels + 2 * quiet_zone_pixels;

    // White background
    let mut img: ImageBuffer<Luma<u8>, Vec<u8>> =
        ImageBuffer::from_pixel(image_size, image_size, Luma([255u8]));

    for (idx, color) in modules.iter().enumerate() {
        if *color != qrcode::Color::Dark {
            continue;
        }

        let row = (idx / qr_width) as u32;
        let col = (idx % qr_width) as u32;
        let x_start = quiet_zone_pixels + col * PNG_MODULE_SIZE;
        let y_start = quiet_zone_pixels + row * PNG_MODULE_SIZE;

        for dy in 0..PNG_MODULE_SIZE {
            for dx in 0..PNG_MODULE_SIZE {
                img.put_pixel(x_start + dx, y_start + dy, Luma([0u8]));
            }
        }
    }

    Ok(img)
}

/// Generates a PNG QR code and saves it to `path`.
pub fn generate_png_qr(data: &str, path: &Path) -> anyhow::Result<()> {
    render_image(data)?.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// Generates a PNG QR code and returns it as bytes.
pub fn generate_png_qr_bytes(data: &str) -> anyhow::Result<Vec<u8>> {
    let img = render_image(data)?;

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;

    Ok(bytes)
}

/// PNG QR code as a `data:image/png;base64,` URL, for use in an `<img>`.
pub fn png_data_url(data: &str) -> anyhow::Result<String> {
    let bytes = generate_png_qr_bytes(data)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
    const URL: &str = "http://192.168.1.20:8080/?token=abc123";

    #[test]
    fn test_terminal_qr_generation() {
        let qr = generate_terminal_qr(URL).expect("Failed to generate terminal QR");

        let lines: Vec<&str> = qr.lines().collect();
        assert!(lines.len() > 10, "QR code should have multiple rows");

        assert!(
            qr.contains('\u{2588}') || qr.contains('\u{2580}') || qr.contains('\u{2584}'),
            "QR code should contain Unicode block characters"
        );

        // Every row has the same width
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
    }

    #[test]
    fn test_png_qr_generation() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("access.png");

        generate_png_qr(URL, &path).expect("Failed to generate PNG QR");

        let file_bytes = std::fs::read(&path).expect("Failed to read file");
        assert!(file_bytes.starts_with(&PNG_HEADER), "File should have PNG header");
    }

    #[test]
    fn test_png_qr_bytes_generation() {
        let bytes = generate_png_qr_bytes(URL).expect("Failed to generate PNG bytes");
        assert!(bytes.starts_with(&PNG_HEADER), "Bytes should have PNG header");
    }

    #[test]
    fn test_png_dimensions_include_quiet_zone() {
        let img = render_image(URL).unwrap();
        let modules = QrCode::new(URL.as_bytes()).unwrap().width() as u32;

        assert_eq!(img.width(), img.height());
        assert_eq!(img.width(), (modules + 2 * PNG_QUIET_ZONE) * PNG_MODULE_SIZE);
        // Corner lies in the quiet zone
        assert_eq!(img.get_pixel(0, 0), &Luma([255u8]));
    }

    #[test]
    fn test_png_data_url() {
        let url = png_data_url(URL).unwrap();
        let encoded = url
            .strip_prefix("data:image/png;base64,")
            .expect("data URL prefix");

        let decoded = BASE64.decode(encoded).unwrap();
        assert!(decoded.starts_with(&PNG_HEADER));
    }

    #[test]
    fn test_data_too_large() {
        let huge = "x".repeat(10_000);
        assert!(generate_terminal_qr(&huge).is_err());
        assert!(png_data_url(&huge).is_err());
    }
}
