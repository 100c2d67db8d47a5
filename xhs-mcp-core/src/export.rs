//! One-shot export of the cover editor page to an image file.

use crate::capture::ScreenshotRequest;
use crate::tools::generate_cover::DEFAULT_TEXT;

pub const EXPORT_SELECTOR: &str = "#exportable";
pub const EXPORT_SETTLE_SECS: u64 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Address of the cover editor front-end.
    pub addr: String,
    pub text: String,
    pub image: String,
    pub output: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            addr: "http://localhost:3000".into(),
            text: DEFAULT_TEXT.into(),
            image: "/assets/6.jpg".into(),
            output: "untitled.jpg".into(),
        }
    }
}

impl ExportOptions {
    /// The editor URL with auto-export disabled, so the page only renders.
    pub fn url(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("autoExport", "false")
            .append_pair("image", &self.image)
            .append_pair("text", &self.text)
            .finish();
        format!("{}?{}", self.addr, query)
    }

    pub fn to_request(&self) -> ScreenshotRequest {
        ScreenshotRequest::new(self.url())
            .selector(EXPORT_SELECTOR)
            .output_path(self.output.clone())
            .wait_time(EXPORT_SETTLE_SECS)
    }
}
