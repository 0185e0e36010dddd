//! QR code rendering for the status page.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use wabridge_core::{error::WabridgeError, traits::QrEncoder};

const MODULE_SIZE: u32 = 8;
const QUIET_ZONE: u32 = 4;

/// Render QR data as PNG bytes, with a white quiet zone around the code.
pub fn render_png(qr_data: &str) -> Result<Vec<u8>, WabridgeError> {
    use image::{ImageBuffer, Luma};
    use qrcode::{Color, EcLevel, QrCode};

    let code = QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::L)
        .map_err(|e| WabridgeError::Qr(format!("QR generation failed: {e}")))?;

    let modules = code.width() as u32;
    let img_size = (modules + QUIET_ZONE * 2) * MODULE_SIZE;

    let img = ImageBuffer::from_fn(img_size, img_size, |x, y| {
        let (cx, cy) = (x / MODULE_SIZE, y / MODULE_SIZE);
        if cx < QUIET_ZONE || cy < QUIET_ZONE {
            return Luma([255u8]);
        }
        let (mx, my) = (cx - QUIET_ZONE, cy - QUIET_ZONE);
        if mx >= modules || my >= modules {
            return Luma([255u8]);
        }
        match code[(mx as usize, my as usize)] {
            Color::Dark => Luma([0u8]),
            Color::Light => Luma([255u8]),
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| WabridgeError::Qr(format!("PNG encoding failed: {e}")))?;

    Ok(buf.into_inner())
}

/// Render QR data as a `data:image/png;base64,...` URI.
pub fn render_data_uri(qr_data: &str) -> Result<String, WabridgeError> {
    let png = render_png(qr_data)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(png)))
}

/// [`QrEncoder`] producing PNG data URIs. Rendering runs on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataUriEncoder;

#[async_trait]
impl QrEncoder for DataUriEncoder {
    async fn encode(&self, qr: &str) -> Result<String, WabridgeError> {
        let qr = qr.to_string();
        tokio::task::spawn_blocking(move || render_data_uri(&qr))
            .await
            .map_err(|e| WabridgeError::Qr(format!("QR render task failed: {e}")))?
    }
}
