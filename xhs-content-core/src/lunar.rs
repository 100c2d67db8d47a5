//! Lunar calendar (黄历) lookup.

use crate::fetch::{http_client, FetchError, FETCH_TIMEOUT};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LunarInfo {
    pub lunar_date: String,
    pub lunar_year: String,
    pub zodiac: String,
    pub solar_term: String,
    pub festival: String,
    pub suit: Vec<String>,
    pub avoid: Vec<String>,
    pub lucky_color: String,
    pub lucky_number: String,
    pub constellation: String,
    pub timestamp: DateTime<Local>,
}

impl LunarInfo {
    pub fn formatted(&self) -> String {
        let mut out = format!(
            "📅 农历：{} {}（{}年），节气：{}",
            self.lunar_year, self.lunar_date, self.zodiac, self.solar_term
        );
        if !self.festival.is_empty() {
            out.push_str(&format!("，节日：{}", self.festival));
        }
        if !self.suit.is_empty() {
            out.push_str(&format!("\n✅ 宜：{}", self.suit.join("、")));
        }
        if !self.avoid.is_empty() {
            out.push_str(&format!("\n❌ 忌：{}", self.avoid.join("、")));
        }
        out.push_str(&format!(
            "\n🍀 幸运色：{}，幸运数字：{}",
            self.lucky_color, self.lucky_number
        ));
        out
    }
}

#[derive(Debug, Deserialize)]
struct HuangliResponse {
    code: i64,
    #[serde(default)]
    data: HuangliData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HuangliData {
    jieqi: String,
    lunardate: String,
    hseb: String,
    xingzuoyunshi: Fortune,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Fortune {
    xingyuncolor: String,
    xingyunnumber: i64,
    supeixingzuo: String,
}

pub struct LunarService {
    client: reqwest::Client,
    api_url: String,
}

impl LunarService {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: http_client(FETCH_TIMEOUT),
            api_url: api_url.into(),
        }
    }

    pub async fn fetch(&self) -> Result<LunarInfo, FetchError> {
        let response = self
            .client
            .get(&self.api_url)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: self.api_url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                service: "lunar API",
                status: status.as_u16(),
            });
        }

        let body: HuangliResponse = response.json().await.map_err(|e| FetchError::Decode {
            service: "lunar API",
            detail: e.to_string(),
        })?;

        if body.code != 1 {
            return Err(FetchError::Api {
                service: "lunar API",
                detail: format!("invalid response code {}", body.code),
            });
        }

        let data = body.data;
        Ok(LunarInfo {
            lunar_date: data.lunardate,
            lunar_year: data.hseb,
            zodiac: String::new(),
            solar_term: data.jieqi,
            festival: String::new(),
            suit: Vec::new(),
            avoid: Vec::new(),
            lucky_color: data.xingzuoyunshi.xingyuncolor,
            lucky_number: data.xingzuoyunshi.xingyunnumber.to_string(),
            constellation: data.xingzuoyunshi.supeixingzuo,
            timestamp: Local::now(),
        })
    }
}
