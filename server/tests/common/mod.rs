//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

#![allow(dead_code)]

use axum::Router;
use futures_util::StreamExt;
use image::{DynamicImage, GrayImage, Rgba, RgbaImage};
use segment_server::codec::{DecodeLimits, decode_data_url, encode_data_url};
use segment_server::server::{AppState, app_routes};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

pub type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Side of the square test image
pub const IMAGE_SIZE: u32 = 100;

/// Create a test application router with state
pub fn create_test_app_with_state() -> (Router, AppState) {
    let app_state = AppState::new();
    let app = app_routes(app_state.clone());
    (app, app_state)
}

/// Create a test application router with all routes configured
pub fn create_test_app() -> Router {
    create_test_app_with_state().0
}

/// Start a test server on a random port
pub async fn start_test_server() -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let app = create_test_app();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, handle)
}

/// Dark 100x100 image with a bright 20x20 square at (25, 25)
pub fn square_image() -> RgbaImage {
    RgbaImage::from_fn(IMAGE_SIZE, IMAGE_SIZE, |x, y| {
        if (25..45).contains(&x) && (25..45).contains(&y) {
            Rgba([240, 240, 240, 255])
        } else {
            Rgba([20, 20, 20, 255])
        }
    })
}

pub fn square_image_data_url() -> String {
    encode_data_url(&DynamicImage::ImageRgba8(square_image())).unwrap()
}

/// Stroke patch with every pixel touched
pub fn stroke_data_url(width: u32, height: u32) -> String {
    let stroke = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]));
    encode_data_url(&DynamicImage::ImageRgba8(stroke)).unwrap()
}

/// Decode a result frame into its 0/255 mask
pub fn decode_result(frame: &str) -> GrayImage {
    let rgba = decode_data_url(frame, DecodeLimits::default()).unwrap();
    DynamicImage::ImageRgba8(rgba).into_luma8()
}

/// Send a JSON frame
pub async fn send_json(ws: &mut TestSocket, value: serde_json::Value) {
    use futures_util::SinkExt;
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Wait for the next text frame
pub async fn recv_text(ws: &mut TestSocket) -> Option<String> {
    let next = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
        None
    });
    next.await.ok().flatten()
}

/// True if no text frame arrives within `wait`
pub async fn expect_silence(ws: &mut TestSocket, wait: Duration) -> bool {
    tokio::time::timeout(wait, ws.next()).await.is_err()
}

/// Initialize test logging for detailed output
pub fn init_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "segment_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
