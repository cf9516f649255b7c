//! Printers: captured text, display-data images and colored diagnostics.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::execution::{ExecutionResult, ImageData};

/// Machine-readable rendering of a whole result.
#[derive(Serialize)]
struct JsonResult<'a> {
    output: &'a str,
    images: Vec<JsonImage>,
}

#[derive(Serialize)]
struct JsonImage {
    mime: &'static str,
    data: String,
}

pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn print(&self, result: &ExecutionResult) {
        if self.json {
            self.print_json(result);
        } else {
            self.print_text(result);
        }
    }

    fn print_text(&self, result: &ExecutionResult) {
        if !result.output.is_empty() {
            print!("{}", result.output);
            if !result.output.ends_with('\n') {
                println!();
            }
        }
        for image in &result.images {
            self.print_image(image);
        }
    }

    /// Emit one image as a display-data line: a JSON object keyed by
    /// MIME type with base64-encoded bytes.
    fn print_image(&self, image: &ImageData) {
        let payload = serde_json::json!({
            (image.format.mime()): BASE64.encode(&image.bytes),
        });
        println!("{payload}");
    }

    fn print_json(&self, result: &ExecutionResult) {
        let view = JsonResult {
            output: &result.output,
            images: result
                .images
                .iter()
                .map(|image| JsonImage {
                    mime: image.format.mime(),
                    data: BASE64.encode(&image.bytes),
                })
                .collect(),
        };
        let line = serde_json::to_string(&view).expect("string-keyed result");
        println!("{line}");
    }
}

pub fn print_error(err: &impl std::fmt::Display) {
    eprintln!("{}", err.red());
}
