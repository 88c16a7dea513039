use serde::{Deserialize, Deserializer};

/// Response of `/userapi/v1/infosimple`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub params: UserParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserParams {
    #[serde(deserialize_with = "de_id")]
    pub id: i64,
}

/// Response of `/courseapi/v2/schedule/get-week-schedules`.
#[derive(Debug, Clone, Deserialize)]
pub struct WeekSchedules {
    pub result: ScheduleResult,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleResult {
    #[serde(default)]
    pub list: Vec<DaySchedule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaySchedule {
    #[serde(default)]
    pub course: Vec<Course>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Course {
    /// Live session id, sent as `sub_id` when searching slides.
    #[serde(deserialize_with = "de_id")]
    pub id: i64,
    #[serde(deserialize_with = "de_id")]
    pub course_id: i64,
    #[serde(default)]
    pub course_title: String,
    #[serde(default)]
    pub teacher_name: String,
    #[serde(default)]
    pub room_name: String,
    #[serde(default)]
    pub start_at: String,
    #[serde(default)]
    pub end_at: String,
}

/// Response of `/pptnote/v1/schedule/search-ppt`.
#[derive(Debug, Clone, Deserialize)]
pub struct PptList {
    #[serde(default)]
    pub list: Vec<PptItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PptItem {
    /// JSON document serialized as a string.
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PptContent {
    #[serde(default)]
    pub pptimgurl: Option<String>,
}

impl PptContent {
    pub fn image_url(&self) -> Option<&str> {
        self.pptimgurl.as_deref().filter(|url| !url.is_empty())
    }
}

/// Ids arrive either as JSON numbers or as numeric strings.
fn de_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(i64),
        Text(String),
    }

    match Id::deserialize(deserializer)? {
        Id::Number(id) => Ok(id),
        Id::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn user_id_from_string_or_number() {
        let a: UserInfo = serde_json::from_str(r#"{"params":{"id":"42","name":"x"}}"#).unwrap();
        let b: UserInfo = serde_json::from_str(r#"{"params":{"id":42}}"#).unwrap();
        assert_eq!(a.params.id, 42);
        assert_eq!(b.params.id, 42);
        assert!(serde_json::from_str::<UserInfo>(r#"{"params":{"id":"abc"}}"#).is_err());
    }

    #[test]
    fn week_schedule_with_missing_fields() {
        let json = r#"{"result":{"list":[{"course":[]},{"course":[
            {"id":"9001","course_id":77,"course_title":"Signals","teacher_name":"Li",
             "room_name":"A101","start_at":"08:25","end_at":"10:00","extra":true}
        ]},{}]}}"#;
        let schedules: WeekSchedules = serde_json::from_str(json).unwrap();
        assert_eq!(schedules.result.list.len(), 3);
        assert!(schedules.result.list[2].course.is_empty());
        assert_eq!(
            schedules.result.list[1].course[0],
            Course {
                id: 9001,
                course_id: 77,
                course_title: "Signals".into(),
                teacher_name: "Li".into(),
                room_name: "A101".into(),
                start_at: "08:25".into(),
                end_at: "10:00".into(),
            }
        );
    }

    #[test]
    fn empty_image_url_is_ignored() {
        let content: PptContent = serde_json::from_str(r#"{"pptimgurl":""}"#).unwrap();
        assert_eq!(content.image_url(), None);
        let content: PptContent = serde_json::from_str(r#"{"page":3}"#).unwrap();
        assert_eq!(content.image_url(), None);
    }
}
