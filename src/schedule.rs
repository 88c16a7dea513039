use chrono::{Datelike, Duration, NaiveDate};

use crate::error::{Error, Result};
use crate::models::{Course, WeekSchedules};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Monday and Sunday of the week containing `date`, as `yyyy-MM-dd`.
pub fn week_bounds(date: NaiveDate) -> (String, String) {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    let sunday = monday + Duration::days(6);
    (
        monday.format(DATE_FORMAT).to_string(),
        sunday.format(DATE_FORMAT).to_string(),
    )
}

/// Offset of `date` in the week schedule list.
///
/// The list is shifted by one from a Monday-first week, so Monday is `-1`,
/// which [`courses_for_day`] resolves to the last entry.
pub fn day_offset(date: NaiveDate) -> i64 {
    i64::from(date.weekday().num_days_from_monday()) - 1
}

/// Courses at `offset`; negative offsets count from the end of the list.
pub fn courses_for_day(schedules: &WeekSchedules, offset: i64) -> Result<&[Course]> {
    let list = &schedules.result.list;
    let index = if offset < 0 {
        usize::try_from(offset.unsigned_abs())
            .ok()
            .and_then(|back| list.len().checked_sub(back))
    } else {
        usize::try_from(offset).ok()
    };
    index
        .and_then(|i| list.get(i))
        .map(|day| day.course.as_slice())
        .ok_or(Error::NoSchedule(offset))
}

/// Picks a course by its 1-based position in the day's listing.
pub fn select_course(courses: &[Course], index: usize) -> Result<&Course> {
    index
        .checked_sub(1)
        .and_then(|i| courses.get(i))
        .ok_or(Error::CourseOutOfRange {
            index,
            count: courses.len(),
        })
}

pub fn describe_course(position: usize, course: &Course) -> String {
    format!(
        "  Course {position}:\n    Title: {}\n    Teacher: {}\n    Room: {}\n    Start Time: {}\n    End Time: {}\n",
        course.course_title, course.teacher_name, course.room_name, course.start_at, course.end_at
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DaySchedule, ScheduleResult};
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn course(id: i64, title: &str) -> Course {
        Course {
            id,
            course_id: id * 10,
            course_title: title.into(),
            teacher_name: "Wang".into(),
            room_name: "B202".into(),
            start_at: "10:25".into(),
            end_at: "12:00".into(),
        }
    }

    #[test]
    fn week_bounds_span_monday_to_sunday() {
        // Saturday
        assert_eq!(
            week_bounds(date(2026, 10, 17)),
            ("2026-10-12".to_string(), "2026-10-18".to_string())
        );
        // Monday, across a month boundary
        assert_eq!(
            week_bounds(date(2026, 6, 1)),
            ("2026-06-01".to_string(), "2026-06-07".to_string())
        );
        // Sunday, across a year boundary
        assert_eq!(
            week_bounds(date(2027, 1, 3)),
            ("2026-12-28".to_string(), "2027-01-03".to_string())
        );
    }

    #[test]
    fn day_offset_shifts_by_one() {
        assert_eq!(day_offset(date(2026, 10, 12)), -1);
        assert_eq!(day_offset(date(2026, 10, 13)), 0);
        assert_eq!(day_offset(date(2026, 10, 18)), 5);
    }

    #[test]
    fn monday_reads_last_entry_of_short_week() {
        let day = |title: &str| DaySchedule {
            course: vec![course(1, title)],
        };
        let schedules = WeekSchedules {
            result: ScheduleResult {
                list: vec![day("Tue"), day("Wed"), day("Thu"), day("Fri"), day("Last")],
            },
        };
        let monday = day_offset(date(2026, 10, 12));
        let courses = courses_for_day(&schedules, monday).unwrap();
        assert_eq!(courses[0].course_title, "Last");

        let empty = WeekSchedules {
            result: ScheduleResult { list: Vec::new() },
        };
        assert!(matches!(
            courses_for_day(&empty, monday),
            Err(Error::NoSchedule(-1))
        ));
    }

    #[test]
    fn selects_one_based_course() {
        let courses = vec![course(1, "Math"), course(2, "Physics")];
        assert_eq!(select_course(&courses, 2).unwrap().course_title, "Physics");
        assert!(matches!(
            select_course(&courses, 0),
            Err(Error::CourseOutOfRange { index: 0, count: 2 })
        ));
        assert!(matches!(
            select_course(&courses, 3),
            Err(Error::CourseOutOfRange { index: 3, count: 2 })
        ));
    }

    #[test]
    fn missing_day_is_an_error() {
        let schedules = WeekSchedules {
            result: ScheduleResult {
                list: vec![DaySchedule {
                    course: vec![course(1, "Math")],
                }],
            },
        };
        assert_eq!(courses_for_day(&schedules, 0).unwrap().len(), 1);
        assert!(matches!(
            courses_for_day(&schedules, 4),
            Err(Error::NoSchedule(4))
        ));
    }

    #[test]
    fn describes_course() {
        let text = describe_course(1, &course(3, "Circuits"));
        assert!(text.starts_with("  Course 1:\n    Title: Circuits\n"));
        assert!(text.contains("    Room: B202\n"));
    }
}
