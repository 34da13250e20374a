use crate::error::GmaoError;
use qrcode::QrCode;
use qrcode::render::svg;
use rand::Rng;

/// Length of an asset lookup code.
pub const CODE_LEN: usize = 12;

/// Uppercase alphanumerics without the look-alikes `0 O 1 I`, so a code read
/// off a damaged label can still be typed in.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Render `code` as an SVG QR image.
pub fn render_svg(code: &str) -> Result<String, GmaoError> {
    let qr = QrCode::new(code.as_bytes())?;
    Ok(qr
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .max_dimensions(300, 300)
        .dark_color(svg::Color("#111827"))
        .light_color(svg::Color("#ffffff"))
        .quiet_zone(true)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_use_the_unambiguous_alphabet() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| ALPHABET.contains(&b)), "{code}");
        }
        assert_ne!(generate_code(), generate_code());
    }

    #[test]
    fn renders_svg() {
        let svg = render_svg("ABCDEFGH2345").unwrap();
        assert!(svg.contains("<svg"));
    }
}
