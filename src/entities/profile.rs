// 👤 User Profile - one per installation
//
// Age and grade are derived from the birth date and stored alongside it;
// `refreshed` recomputes them for a later "today".

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub name: String,
    pub birth_date: NaiveDate,
    pub age: u32,
    pub grade: String,
}

impl UserInfo {
    pub fn new(name: String, birth_date: NaiveDate, today: NaiveDate) -> Self {
        let age = calculate_age(birth_date, today);
        UserInfo {
            name,
            birth_date,
            age,
            grade: calculate_grade(age),
        }
    }

    /// Same person, age and grade recomputed as of `today`
    pub fn refreshed(&self, today: NaiveDate) -> Self {
        UserInfo::new(self.name.clone(), self.birth_date, today)
    }

    /// "山田太郎 (12歳 / 小学7年生)"
    pub fn headline(&self) -> String {
        format!("{} ({}歳 / {})", self.name, self.age, self.grade)
    }
}

/// Whole years between `birth_date` and `today`.
/// Birth dates in the future yield 0.
pub fn calculate_age(birth_date: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - birth_date.year();

    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }

    age.max(0) as u32
}

/// School-level label for an age
pub fn calculate_grade(age: u32) -> String {
    match age {
        0..=6 => "幼稚園".to_string(),
        7..=12 => format!("小学{}年生", age - 5),
        13..=15 => format!("中学{}年生", age - 11),
        16..=18 => format!("高校{}年生", age - 14),
        19..=22 => format!("大学{}年生", age - 17),
        _ => "一般".to_string(),
    }
}
