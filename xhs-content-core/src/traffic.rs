//! Synthetic traffic report keyed on the hour of day.
//!
//! There is no upstream traffic feed; the report follows the city's usual
//! rush-hour pattern so the workflow has something stable to log.

use chrono::{DateTime, Duration, Local, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadInfo {
    pub name: String,
    pub status: String,
    /// Average speed, km/h.
    pub speed: u32,
    pub travel_time: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficIncident {
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    pub description: String,
    pub severity: String,
    pub start_time: String,
    pub estimated_end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficInfo {
    pub city: String,
    pub overall_status: String,
    /// 1 (clear) to 10 (gridlock).
    pub congestion_level: i32,
    pub main_roads: Vec<RoadInfo>,
    pub incidents: Vec<TrafficIncident>,
    pub recommendation: String,
    pub timestamp: DateTime<Local>,
}

impl TrafficInfo {
    pub fn formatted(&self) -> String {
        let mut out = format!(
            "🚗 {}交通：整体{}（拥堵等级{}/10）\n💡 出行建议：{}\n",
            self.city, self.overall_status, self.congestion_level, self.recommendation
        );

        if !self.main_roads.is_empty() {
            out.push_str("\n🛣️ 主要道路：\n");
            for road in &self.main_roads {
                out.push_str(&format!(
                    "• {}：{}（平均{}km/h，预计{}）\n",
                    road.name, road.status, road.speed, road.travel_time
                ));
            }
        }

        if !self.incidents.is_empty() {
            out.push_str("\n⚠️ 交通事件：\n");
            for incident in &self.incidents {
                out.push_str(&format!(
                    "• {}：{}（{}，{}开始）\n",
                    incident.kind, incident.location, incident.description, incident.start_time
                ));
            }
        }

        out
    }
}

pub struct TrafficService {
    city: String,
}

impl TrafficService {
    pub fn new(city: impl Into<String>) -> Self {
        Self { city: city.into() }
    }

    pub fn fetch(&self) -> TrafficInfo {
        self.report_at(Local::now())
    }

    pub fn report_at(&self, now: DateTime<Local>) -> TrafficInfo {
        let (overall, level, recommendation) = match now.hour() {
            7..=9 => ("拥堵", 8, "早高峰时段，建议错峰出行或选择公共交通"),
            17..=19 => ("拥堵", 9, "晚高峰时段，道路拥堵严重，建议延后出行"),
            10..=16 => ("缓行", 4, "白天时段，整体路况良好，适合出行"),
            20..=23 | 0..=6 => ("畅通", 2, "夜间时段，道路畅通，出行便利"),
            _ => ("缓行", 5, "路况一般，注意安全驾驶"),
        };

        let road = |name: &str, level: i32, travel_time: &str, description: &str| RoadInfo {
            name: name.to_string(),
            status: status_for_level(level).to_string(),
            speed: speed_for_level(level),
            travel_time: travel_time.to_string(),
            description: description.to_string(),
        };

        let main_roads = vec![
            road("三环路", level, "45-60分钟", "主要环路，车流量较大"),
            road("长安街", level - 1, "30-40分钟", "东西主干道，通行状况良好"),
            road("京藏高速", level + 1, "60-90分钟", "进出京主要通道，易发生拥堵"),
            road("中关村大街", level, "25-35分钟", "科技园区主干道，上下班时段较拥堵"),
        ];

        TrafficInfo {
            city: self.city.clone(),
            overall_status: overall.to_string(),
            congestion_level: level,
            main_roads,
            incidents: incidents_for(level, now),
            recommendation: recommendation.to_string(),
            timestamp: now,
        }
    }
}

fn incidents_for(level: i32, now: DateTime<Local>) -> Vec<TrafficIncident> {
    let incident = |kind: &str,
                    location: &str,
                    description: &str,
                    severity: &str,
                    start: String,
                    end: String| TrafficIncident {
        kind: kind.to_string(),
        location: location.to_string(),
        description: description.to_string(),
        severity: severity.to_string(),
        start_time: start,
        estimated_end: end,
    };

    if level > 6 {
        vec![
            incident(
                "交通事故",
                "三环路国贸桥附近",
                "两车追尾，占用一条车道",
                "一般",
                (now - Duration::minutes(30)).format("%H:%M").to_string(),
                (now + Duration::minutes(20)).format("%H:%M").to_string(),
            ),
            incident(
                "道路施工",
                "京藏高速清河收费站",
                "路面维修，限制通行",
                "轻微",
                "09:00".into(),
                "17:00".into(),
            ),
        ]
    } else if level > 3 {
        vec![incident(
            "交通管制",
            "天安门广场周边",
            "临时交通管制，请绕行",
            "轻微",
            "08:00".into(),
            "18:00".into(),
        )]
    } else {
        Vec::new()
    }
}

fn status_for_level(level: i32) -> &'static str {
    match level.clamp(0, 10) {
        0..=3 => "畅通",
        4..=6 => "缓行",
        _ => "拥堵",
    }
}

/// 60 km/h when clear, 5 km/h slower per congestion level.
fn speed_for_level(level: i32) -> u32 {
    (60 - level.clamp(0, 10) * 5).unsigned_abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 10, 15, hour, minute, 0)
            .earliest()
            .unwrap()
    }

    #[test]
    fn test_morning_rush() {
        let info = TrafficService::new("Beijing").report_at(at(8, 15));
        assert_eq!(info.overall_status, "拥堵");
        assert_eq!(info.congestion_level, 8);
        assert_eq!(info.incidents.len(), 2);
        assert_eq!(info.incidents[0].start_time, "07:45");
        assert_eq!(info.incidents[0].estimated_end, "08:35");

        let jingzang = &info.main_roads[2];
        assert_eq!(jingzang.name, "京藏高速");
        assert_eq!(jingzang.status, "拥堵");
        assert_eq!(jingzang.speed, 15);
    }

    #[test]
    fn test_daytime_has_single_control_incident() {
        let info = TrafficService::new("Beijing").report_at(at(13, 0));
        assert_eq!(info.congestion_level, 4);
        assert_eq!(info.incidents.len(), 1);
        assert_eq!(info.incidents[0].kind, "交通管制");
        assert_eq!(info.main_roads[1].status, "畅通");
    }

    #[test]
    fn test_night_is_clear() {
        for hour in [0, 3, 6, 20, 23] {
            let info = TrafficService::new("Beijing").report_at(at(hour, 0));
            assert_eq!(info.overall_status, "畅通", "hour {hour}");
            assert!(info.incidents.is_empty());
        }
    }

    #[test]
    fn test_level_helpers_clamp() {
        assert_eq!(speed_for_level(-2), 60);
        assert_eq!(speed_for_level(12), 10);
        assert_eq!(status_for_level(3), "畅通");
        assert_eq!(status_for_level(6), "缓行");
        assert_eq!(status_for_level(11), "拥堵");
    }

    #[test]
    fn test_formatted() {
        let text = TrafficService::new("Beijing").report_at(at(22, 0)).formatted();
        assert!(text.starts_with("🚗 Beijing交通：整体畅通（拥堵等级2/10）\n💡 出行建议：夜间时段"));
        assert!(text.contains("• 长安街：畅通（平均55km/h，预计30-40分钟）\n"));
        assert!(!text.contains("交通事件"));
    }
}
