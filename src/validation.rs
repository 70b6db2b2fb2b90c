use std::fmt::{Display, Formatter};

use crate::domain::{MAX_MINUTES, MAX_TASK_CHARS, MIN_MINUTES};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("inform the task")]
    Required,
    #[error("at most {max} characters")]
    TooLong { max: usize },
    #[error("minutes must be a whole number")]
    NotANumber,
    #[error("minimum of {min} minutes")]
    TooSmall { min: u32 },
    #[error("maximum of {max} minutes")]
    TooLarge { max: u32 },
}

/// Raw form input as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct NewCycleForm {
    pub task: String,
    pub minutes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCycleData {
    pub task: String,
    pub minutes_amount: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub task: Option<FieldError>,
    pub minutes: Option<FieldError>,
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(err) = &self.task {
            parts.push(format!("task: {err}"));
        }
        if let Some(err) = &self.minutes {
            parts.push(format!("minutes: {err}"));
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl NewCycleForm {
    pub fn new(task: impl Into<String>, minutes: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            minutes: minutes.into(),
        }
    }

    /// Submit stays disabled until a task is typed.
    pub fn can_submit(&self) -> bool {
        !self.task.trim().is_empty()
    }

    pub fn validate(&self) -> Result<NewCycleData, ValidationErrors> {
        let task = validate_task(&self.task);
        let minutes = validate_minutes(&self.minutes);

        match (task, minutes) {
            (Ok(task), Ok(minutes_amount)) => Ok(NewCycleData {
                task,
                minutes_amount,
            }),
            (task, minutes) => Err(ValidationErrors {
                task: task.err(),
                minutes: minutes.err(),
            }),
        }
    }
}

pub fn validate_task(input: &str) -> Result<String, FieldError> {
    let task = input.trim();
    if task.is_empty() {
        return Err(FieldError::Required);
    }
    if task.chars().count() > MAX_TASK_CHARS {
        return Err(FieldError::TooLong {
            max: MAX_TASK_CHARS,
        });
    }
    Ok(task.to_string())
}

pub fn validate_minutes(input: &str) -> Result<u32, FieldError> {
    let minutes: i64 = input.trim().parse().map_err(|_| FieldError::NotANumber)?;
    check_minutes(minutes)
}

pub fn check_minutes(minutes: i64) -> Result<u32, FieldError> {
    if minutes < i64::from(MIN_MINUTES) {
        return Err(FieldError::TooSmall { min: MIN_MINUTES });
    }
    if minutes > i64::from(MAX_MINUTES) {
        return Err(FieldError::TooLarge { max: MAX_MINUTES });
    }
    Ok(minutes as u32)
}

#[cfg(test)]
mod tests {
    use super::{FieldError, NewCycleData, NewCycleForm};

    #[test]
    fn accepts_valid_form() {
        let form = NewCycleForm::new("  Write report ", "25");
        assert_eq!(
            form.validate(),
            Ok(NewCycleData {
                task: "Write report".to_string(),
                minutes_amount: 25,
            })
        );
    }

    #[test]
    fn reports_errors_per_field() {
        let errors = NewCycleForm::new("", "3").validate().unwrap_err();
        assert_eq!(errors.task, Some(FieldError::Required));
        assert_eq!(errors.minutes, Some(FieldError::TooSmall { min: 5 }));
        assert_eq!(
            errors.to_string(),
            "task: inform the task; minutes: minimum of 5 minutes"
        );
    }

    #[test]
    fn enforces_minute_bounds_inclusively() {
        assert!(NewCycleForm::new("a", "5").validate().is_ok());
        assert!(NewCycleForm::new("a", "60").validate().is_ok());
        assert!(NewCycleForm::new("a", "7").validate().is_ok());
        let errors = NewCycleForm::new("a", "61").validate().unwrap_err();
        assert_eq!(errors.minutes, Some(FieldError::TooLarge { max: 60 }));
        assert!(errors.task.is_none());
        let errors = NewCycleForm::new("a", "ten").validate().unwrap_err();
        assert_eq!(errors.minutes, Some(FieldError::NotANumber));
    }

    #[test]
    fn counts_task_length_in_characters() {
        let at_limit = "é".repeat(64);
        assert!(NewCycleForm::new(at_limit, "25").validate().is_ok());
        let over = "x".repeat(65);
        let errors = NewCycleForm::new(over, "25").validate().unwrap_err();
        assert_eq!(errors.task, Some(FieldError::TooLong { max: 64 }));
    }

    #[test]
    fn submit_disabled_without_task() {
        assert!(!NewCycleForm::new("   ", "25").can_submit());
        assert!(NewCycleForm::new("x", "").can_submit());
    }
}
