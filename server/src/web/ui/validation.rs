use crate::web::ui::form_values::{
    FormValueRepresentation, ValidateFromFormInput, ValidationDataForFormValue,
};
use chrono::Timelike;
use std::fmt::Debug;

#[derive(Default, Debug, PartialEq)]
pub struct Int32FromList(pub i32);

impl Int32FromList {
    pub fn into_inner(self) -> i32 {
        self.0
    }
}

impl FormValueRepresentation for Int32FromList {
    fn into_form_value_string(self) -> String {
        self.0.to_string()
    }
}

impl ValidationDataForFormValue<Int32FromList> for &Vec<i32> {
    fn validate_form_value(self, value: &'_ str) -> Result<Int32FromList, String> {
        let id: i32 = value.parse().map_err(|e| format!("Not an id: {}", e))?;
        if self.contains(&id) {
            Ok(Int32FromList(id))
        } else {
            Err("Unknown id".to_owned())
        }
    }
}

/// A string value that must be one of a fixed list of choices (e.g. a select input)
#[derive(Default, Debug, PartialEq)]
pub struct ChoiceFromList(pub String);

impl ChoiceFromList {
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FormValueRepresentation for ChoiceFromList {
    fn into_form_value_string(self) -> String {
        self.0
    }
}

impl ValidationDataForFormValue<ChoiceFromList> for &[&str] {
    fn validate_form_value(self, value: &'_ str) -> Result<ChoiceFromList, String> {
        if self.contains(&value) {
            Ok(ChoiceFromList(value.to_owned()))
        } else {
            Err("Unknown choice".to_owned())
        }
    }
}

#[derive(Default, Debug, PartialEq)]
pub struct TimeOfDay(pub chrono::NaiveTime);

impl TimeOfDay {
    pub fn into_inner(self) -> chrono::NaiveTime {
        self.0
    }
}

impl FormValueRepresentation for TimeOfDay {
    fn into_form_value_string(self) -> String {
        if self.0.second() != 0 {
            self.0.format("%H:%M:%S").to_string()
        } else {
            self.0.format("%H:%M").to_string()
        }
    }
}
impl ValidateFromFormInput for TimeOfDay {
    fn from_form_value(value: &str) -> Result<Self, String> {
        // 24-hour formats first, then the 12-hour formats with AM/PM suffix
        chrono::NaiveTime::parse_from_str(value, "%H:%M:%S")
            .or_else(|_| chrono::NaiveTime::parse_from_str(value, "%H:%M"))
            .or_else(|_| chrono::NaiveTime::parse_from_str(value, "%I:%M%p"))
            .or_else(|_| chrono::NaiveTime::parse_from_str(value, "%I:%M %p"))
            .map(Self)
            .map_err(|_| "Not a valid time of day".to_owned())
    }
}

/// A positive (non-zero) integer value, e.g. a minimum class size
#[derive(Debug, PartialEq)]
pub struct PositiveInt(pub i32);

impl PositiveInt {
    pub fn into_inner(self) -> i32 {
        self.0
    }
}

impl Default for PositiveInt {
    fn default() -> Self {
        Self(1)
    }
}

impl FormValueRepresentation for PositiveInt {
    fn into_form_value_string(self) -> String {
        self.0.to_string()
    }
}

impl ValidateFromFormInput for PositiveInt {
    fn from_form_value(value: &'_ str) -> Result<Self, String> {
        let number: i32 = value
            .parse()
            .map_err(|e| format!("Not a number: {}", e))?;
        if number < 1 {
            return Err("Must be at least 1".to_owned());
        }
        Ok(Self(number))
    }
}

/// A floating point number of credits, e.g. "1.0" or "0.5"
#[derive(Default, Debug, PartialEq)]
pub struct CreditValue(pub f64);

impl CreditValue {
    pub fn into_inner(self) -> f64 {
        self.0
    }
}

impl FormValueRepresentation for CreditValue {
    fn into_form_value_string(self) -> String {
        self.0.to_string()
    }
}

impl ValidateFromFormInput for CreditValue {
    fn from_form_value(value: &'_ str) -> Result<Self, String> {
        let number: f64 = value
            .parse()
            .map_err(|e| format!("Not a number: {}", e))?;
        if !number.is_finite() || number < 0.0 {
            return Err("Must be a non-negative number".to_owned());
        }
        Ok(Self(number))
    }
}

#[derive(Debug, PartialEq)]
pub struct MaybeEmpty<T>(pub Option<T>);

impl<T> Default for MaybeEmpty<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T: FormValueRepresentation + PartialEq> FormValueRepresentation for MaybeEmpty<T> {
    fn into_form_value_string(self) -> String {
        match self.0 {
            None => "".to_owned(),
            Some(t) => t.into_form_value_string(),
        }
    }
}

impl<T: ValidateFromFormInput + PartialEq> ValidateFromFormInput for MaybeEmpty<T> {
    fn from_form_value(value: &'_ str) -> Result<Self, String> {
        if value.is_empty() {
            Ok(Self(None))
        } else {
            Ok(Self(Some(T::from_form_value(value)?)))
        }
    }
}

impl<T: FormValueRepresentation + PartialEq, D: ValidationDataForFormValue<T>>
    ValidationDataForFormValue<MaybeEmpty<T>> for D
{
    fn validate_form_value(self, value: &'_ str) -> Result<MaybeEmpty<T>, String> {
        if value.is_empty() {
            Ok(MaybeEmpty(None))
        } else {
            Ok(MaybeEmpty(Some(
                <D as ValidationDataForFormValue<T>>::validate_form_value(self, value)?,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_from_string() {
        assert_eq!(
            TimeOfDay::from_form_value("14:30").unwrap().into_inner(),
            chrono::NaiveTime::from_hms_opt(14, 30, 0).unwrap()
        );
        assert_eq!(
            TimeOfDay::from_form_value("14:30:15").unwrap().into_inner(),
            chrono::NaiveTime::from_hms_opt(14, 30, 15).unwrap()
        );
        assert_eq!(
            TimeOfDay::from_form_value("2:30PM").unwrap().into_inner(),
            chrono::NaiveTime::from_hms_opt(14, 30, 0).unwrap()
        );
        assert_eq!(
            TimeOfDay::from_form_value("2:30 pm").unwrap().into_inner(),
            chrono::NaiveTime::from_hms_opt(14, 30, 0).unwrap()
        );
        assert!(TimeOfDay::from_form_value("25:00").is_err());
        assert!(TimeOfDay::from_form_value("half past two").is_err());
        assert!(TimeOfDay::from_form_value("").is_err());
    }

    #[test]
    fn test_positive_int() {
        assert_eq!(PositiveInt::from_form_value("15"), Ok(PositiveInt(15)));
        assert!(PositiveInt::from_form_value("0").is_err());
        assert!(PositiveInt::from_form_value("-3").is_err());
        assert!(PositiveInt::from_form_value("3.5").is_err());
    }

    #[test]
    fn test_credit_value() {
        assert_eq!(CreditValue::from_form_value("1"), Ok(CreditValue(1.0)));
        assert_eq!(CreditValue::from_form_value("0.25"), Ok(CreditValue(0.25)));
        assert!(CreditValue::from_form_value("-1").is_err());
        assert!(CreditValue::from_form_value("NaN").is_err());
        assert!(CreditValue::from_form_value("one").is_err());
    }

    #[test]
    fn test_choice_from_list() {
        let choices: &[&str] = &["any", "full", "partial", "exact"];
        assert_eq!(
            <&[&str] as ValidationDataForFormValue<ChoiceFromList>>::validate_form_value(
                choices, "full"
            ),
            Ok(ChoiceFromList("full".to_owned()))
        );
        assert!(
            <&[&str] as ValidationDataForFormValue<ChoiceFromList>>::validate_form_value(
                choices, "bogus"
            )
            .is_err()
        );
    }

    #[test]
    fn test_maybe_empty() {
        assert_eq!(
            MaybeEmpty::<TimeOfDay>::from_form_value("").unwrap(),
            MaybeEmpty(None)
        );
        assert_eq!(
            MaybeEmpty::<TimeOfDay>::from_form_value("9:00").unwrap(),
            MaybeEmpty(Some(TimeOfDay(
                chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap()
            )))
        );
        assert!(MaybeEmpty::<TimeOfDay>::from_form_value("nonsense").is_err());
    }
}
