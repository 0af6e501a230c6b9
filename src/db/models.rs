//! Database models
//!
//! Data structures representing database tables

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Account role. Stored as a small integer, exposed over JSON as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    Professor,
}

impl Role {
    /// Column value in the `users.role` column
    pub fn as_i64(self) -> i64 {
        match self {
            Role::Student => 1,
            Role::Professor => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Professor => "professor",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Student
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i64> for Role {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Role::Student),
            2 => Ok(Role::Professor),
            other => Err(format!("unknown role value: {}", other)),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "professor" => Ok(Role::Professor),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Older clients send the numeric column value
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Code(i64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Name(name) => name.parse().map_err(serde::de::Error::custom),
            Repr::Code(code) => Role::try_from(code).map_err(serde::de::Error::custom),
        }
    }
}

impl rusqlite::types::ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(self.as_i64().into())
    }
}

impl rusqlite::types::FromSql for Role {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        let code = value.as_i64()?;
        Role::try_from(code).map_err(|_| rusqlite::types::FromSqlError::OutOfRange(code))
    }
}

/// User record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: String,
}

/// Fields needed to insert a user; the id is assigned by the database
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
}

/// Course record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub professor_id: i64,
    pub created_at: String,
}

/// Enrollment record joined with its course, as listed for a student
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourse {
    pub course_id: i64,
    pub course_name: String,
    pub course_code: String,
    pub joined_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_json_accepts_names_and_codes() {
        let role: Role = serde_json::from_str("\"professor\"").unwrap();
        assert_eq!(role, Role::Professor);

        let role: Role = serde_json::from_str("\"Student\"").unwrap();
        assert_eq!(role, Role::Student);

        let role: Role = serde_json::from_str("2").unwrap();
        assert_eq!(role, Role::Professor);

        assert!(serde_json::from_str::<Role>("3").is_err());
        assert!(serde_json::from_str::<Role>("\"admin\"").is_err());
    }

    #[test]
    fn test_role_serializes_as_name() {
        assert_eq!(serde_json::to_string(&Role::Student).unwrap(), "\"student\"");
        assert_eq!(serde_json::to_string(&Role::Professor).unwrap(), "\"professor\"");
    }

    #[test]
    fn test_role_column_values() {
        assert_eq!(Role::try_from(Role::Student.as_i64()), Ok(Role::Student));
        assert_eq!(Role::try_from(Role::Professor.as_i64()), Ok(Role::Professor));
        assert!(Role::try_from(0).is_err());
    }
}
