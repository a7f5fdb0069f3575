use crate::db::DatabaseError;
use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Serde uses the same strings as the database columns.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(DayOfWeek {
    Monday => "monday",
    Tuesday => "tuesday",
    Wednesday => "wednesday",
    Thursday => "thursday",
    Friday => "friday",
    Saturday => "saturday",
    Sunday => "sunday",
});

impl DayOfWeek {
    /// ISO weekday number, Monday = 1 … Sunday = 7.
    pub fn number(&self) -> u32 {
        self.weekday().number_from_monday()
    }

    pub fn weekday(&self) -> Weekday {
        match self {
            Self::Monday => Weekday::Mon,
            Self::Tuesday => Weekday::Tue,
            Self::Wednesday => Weekday::Wed,
            Self::Thursday => Weekday::Thu,
            Self::Friday => Weekday::Fri,
            Self::Saturday => Weekday::Sat,
            Self::Sunday => Weekday::Sun,
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

str_enum!(SessionType {
    Online => "online",
    InPerson => "in_person",
    Both => "both",
});

impl SessionType {
    /// Whether a slot declared with `self` can host a session of `wanted` type.
    pub fn accepts(&self, wanted: SessionType) -> bool {
        *self == wanted || *self == SessionType::Both || wanted == SessionType::Both
    }
}

str_enum!(ExceptionType {
    Unavailable => "unavailable",
    Modified => "modified",
});

str_enum!(EventType {
    Appointment => "appointment",
    Break => "break",
    Holiday => "holiday",
    Custom => "custom",
});

str_enum!(Visibility {
    Public => "public",
    Private => "private",
});

str_enum!(RecurrenceType {
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});

str_enum!(LocationType {
    Online => "online",
    InPerson => "in_person",
    Phone => "phone",
});

str_enum!(ReminderChannel {
    Email => "email",
    Sms => "sms",
    Push => "push",
    Whatsapp => "whatsapp",
});

str_enum!(ReminderStatus {
    Pending => "pending",
    Sent => "sent",
    Failed => "failed",
});

str_enum!(SyncProvider {
    Google => "google",
    Outlook => "outlook",
    Apple => "apple",
});

str_enum!(SyncDirection {
    Import => "import",
    Export => "export",
    Both => "both",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn day_of_week_iso_numbers() {
        assert_eq!(DayOfWeek::Monday.number(), 1);
        assert_eq!(DayOfWeek::Sunday.number(), 7);
        assert_eq!(DayOfWeek::from(Weekday::Wed), DayOfWeek::Wednesday);
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = ReminderChannel::from_str("pigeon").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn serde_uses_column_strings() {
        let json = serde_json::to_string(&SessionType::InPerson).unwrap();
        assert_eq!(json, "\"in_person\"");
        let parsed: ExceptionType = serde_json::from_str("\"modified\"").unwrap();
        assert_eq!(parsed, ExceptionType::Modified);
    }

    #[test]
    fn session_type_both_accepts_everything() {
        assert!(SessionType::Both.accepts(SessionType::Online));
        assert!(SessionType::Online.accepts(SessionType::Online));
        assert!(!SessionType::Online.accepts(SessionType::InPerson));
        assert!(SessionType::InPerson.accepts(SessionType::Both));
    }
}
