use crate::data_store::models::{Department, FullCourse};
use crate::data_store::{tokenize_keywords, Campus, CourseSearch, CreditFilter, DayMode};
use crate::web::ui::base_template::BaseTemplateContext;
use crate::web::ui::error::AppError;
use crate::web::ui::form_values::{BoolFormValue, FormValue, _FormValidSimpleValidate};
use crate::web::ui::sub_templates::form_inputs::{
    CheckboxTemplate, FormFieldTemplate, InputConfiguration, InputSize, InputType, SelectEntry,
    SelectTemplate,
};
use crate::web::ui::validation::{
    ChoiceFromList, CreditValue, Int32FromList, MaybeEmpty, PositiveInt, TimeOfDay,
};
use crate::web::AppState;
use actix_web::http::header;
use actix_web::http::header::{ContentType, TryIntoHeaderValue};
use actix_web::web::Html;
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use askama::Template;
use serde::Deserialize;
use std::borrow::Cow;

const CREDIT_CHOICES: &[&str] = &["any", "full", "partial", "exact"];

fn default_credit_type() -> FormValue<ChoiceFromList> {
    FormValue::from(ChoiceFromList("any".to_owned()))
}

/// The raw course search form input, deserialized from the query string.
///
/// The form is submitted via GET, so search results can be bookmarked and shared. The `search`
/// field is the submit button's name: without it, the empty form is shown without running a
/// search.
#[derive(Deserialize, Default)]
struct CourseSearchFormData {
    #[serde(default)]
    search: BoolFormValue,
    #[serde(default)]
    department: FormValue<MaybeEmpty<Int32FromList>>,
    #[serde(default)]
    monday: BoolFormValue,
    #[serde(default)]
    tuesday: BoolFormValue,
    #[serde(default)]
    wednesday: BoolFormValue,
    #[serde(default)]
    thursday: BoolFormValue,
    #[serde(default)]
    friday: BoolFormValue,
    #[serde(default)]
    only_days: BoolFormValue,
    #[serde(default)]
    start_time: FormValue<MaybeEmpty<TimeOfDay>>,
    #[serde(default)]
    end_time: FormValue<MaybeEmpty<TimeOfDay>>,
    #[serde(default)]
    instructor: FormValue<String>,
    #[serde(default)]
    min_size: FormValue<MaybeEmpty<PositiveInt>>,
    #[serde(default = "default_credit_type")]
    credit_type: FormValue<ChoiceFromList>,
    #[serde(default)]
    credit_value: FormValue<MaybeEmpty<CreditValue>>,
    #[serde(default)]
    keywords: FormValue<String>,
    #[serde(default)]
    c_cgu: BoolFormValue,
    #[serde(default)]
    c_cm: BoolFormValue,
    #[serde(default)]
    c_cu: BoolFormValue,
    #[serde(default)]
    c_hm: BoolFormValue,
    #[serde(default)]
    c_po: BoolFormValue,
    #[serde(default)]
    c_pz: BoolFormValue,
    #[serde(default)]
    c_sc: BoolFormValue,
}

impl CourseSearchFormData {
    /// The campus checkbox fields with their form names and enum values
    fn campus_fields(&self) -> [(&'static str, Campus, &BoolFormValue); 7] {
        [
            ("c_cgu", Campus::Cgu, &self.c_cgu),
            ("c_cm", Campus::Cm, &self.c_cm),
            ("c_cu", Campus::Cu, &self.c_cu),
            ("c_hm", Campus::Hm, &self.c_hm),
            ("c_po", Campus::Po, &self.c_po),
            ("c_pz", Campus::Pz, &self.c_pz),
            ("c_sc", Campus::Sc, &self.c_sc),
        ]
    }

    /// Validate all fields and assemble the declarative search.
    ///
    /// Validation error messages are attached to the individual fields; a form-level error
    /// (e.g. no constraint at all) is returned as the `Err` variant.
    fn validate(&mut self, department_ids: &Vec<i32>) -> Option<Result<CourseSearch, String>> {
        let department = self.department.validate_with(department_ids);
        let start_time = self.start_time.validate();
        let end_time = self.end_time.validate();
        let instructor = self.instructor.validate();
        let min_size = self.min_size.validate();
        let credit_type = self.credit_type.validate_with(CREDIT_CHOICES);
        let credit_value = self.credit_value.validate();
        let keywords = self.keywords.validate();

        let credit = match (credit_type, credit_value) {
            (Some(choice), Some(value)) => match (choice.0.as_str(), value.0) {
                ("any", _) => Some(CreditFilter::Any),
                ("full", _) => Some(CreditFilter::Full),
                ("partial", _) => Some(CreditFilter::Partial),
                ("exact", Some(v)) => Some(CreditFilter::Exact(v.into_inner())),
                ("exact", None) => {
                    self.credit_value
                        .add_error("A credit value is required for an exact search".to_owned());
                    None
                }
                _ => None,
            },
            _ => None,
        };

        let search = CourseSearch {
            department: department?.0.map(|d| d.into_inner()),
            mode: if self.only_days.get_value() {
                DayMode::Only
            } else {
                DayMode::AtLeast
            },
            monday: self.monday.get_value(),
            tuesday: self.tuesday.get_value(),
            wednesday: self.wednesday.get_value(),
            thursday: self.thursday.get_value(),
            friday: self.friday.get_value(),
            start_range: start_time?.0.map(|t| t.into_inner()),
            end_range: end_time?.0.map(|t| t.into_inner()),
            instructor: instructor?,
            min_class_size: min_size?.0.map(|s| s.into_inner()).unwrap_or(0),
            credit: credit?,
            keywords: tokenize_keywords(&keywords?),
            campuses: self
                .campus_fields()
                .into_iter()
                .filter(|(_, _, value)| value.get_value())
                .map(|(_, campus, _)| campus)
                .collect(),
        };

        if search.is_unconstrained() {
            return Some(Err(
                "Please specify at least one search constraint.".to_owned()
            ));
        }
        Some(Ok(search))
    }
}

#[get("/courses")]
async fn course_search(
    state: web::Data<AppState>,
    query: web::Query<CourseSearchFormData>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let mut data = query.into_inner();

    let store = state.store.clone();
    let departments = web::block(move || -> Result<_, AppError> {
        let mut store = store.get_facade()?;
        Ok(store.get_departments_with_courses()?)
    })
    .await??;

    if !data.search.get_value() {
        let tmpl = build_course_search_template(&req, &data, &departments, None, None)?;
        return Ok(Html::new(tmpl.render()?).respond_to(&req).map_into_boxed_body());
    }

    let department_ids: Vec<i32> = departments.iter().map(|d| d.id).collect();
    let (search, form_error) = match data.validate(&department_ids) {
        Some(Ok(search)) => (Some(search), None),
        Some(Err(form_error)) => (None, Some(form_error)),
        None => (None, None),
    };

    let Some(search) = search else {
        let tmpl =
            build_course_search_template(&req, &data, &departments, form_error.as_deref(), None)?;
        return Ok(HttpResponse::UnprocessableEntity()
            .append_header((
                header::CONTENT_TYPE,
                ContentType::html().try_into_value().unwrap(),
            ))
            .body(tmpl.render()?));
    };

    let store = state.store.clone();
    let courses = web::block(move || -> Result<_, AppError> {
        let mut store = store.get_facade()?;
        Ok(store.search_courses(&search)?)
    })
    .await??;

    let results: Vec<CourseResultRow> = courses.into_iter().map(course_result_row).collect();
    let tmpl =
        build_course_search_template(&req, &data, &departments, None, Some(results.as_slice()))?;
    Ok(Html::new(tmpl.render()?).respond_to(&req).map_into_boxed_body())
}

/// A search result row, with the meeting schedule preformatted for the results table
struct CourseResultRow {
    code: String,
    name: String,
    instructor: String,
    credit: f64,
    spots: i32,
    meetings: Vec<String>,
}

fn course_result_row(course: FullCourse) -> CourseResultRow {
    let meetings = course
        .meetings
        .iter()
        .map(|m| {
            format!(
                "{} {}-{} ({})",
                m.days_string(),
                m.begin.format("%H:%M"),
                m.end.format("%H:%M"),
                Campus::try_from(m.campus).map(|c| c.name()).unwrap_or("?"),
            )
        })
        .collect();
    CourseResultRow {
        code: course.course.code,
        name: course.course.name,
        instructor: course.course.instructor,
        credit: course.course.credit,
        spots: course.course.spots,
        meetings,
    }
}

fn build_course_search_template<'a>(
    req: &'a HttpRequest,
    data: &CourseSearchFormData,
    departments: &[Department],
    form_error: Option<&'a str>,
    results: Option<&'a [CourseResultRow]>,
) -> Result<CourseSearchTemplate<'a>, AppError> {
    let mut department_entries: Vec<SelectEntry> = vec![SelectEntry {
        value: Cow::Borrowed(""),
        text: Cow::Borrowed("Any department"),
    }];
    department_entries.extend(departments.iter().map(|d| SelectEntry {
        value: Cow::Owned(d.id.to_string()),
        text: Cow::Owned(format!("{} - {}", d.code, d.name)),
    }));
    let credit_entries: Vec<SelectEntry> = vec![
        SelectEntry {
            value: Cow::Borrowed("any"),
            text: Cow::Borrowed("Any credit"),
        },
        SelectEntry {
            value: Cow::Borrowed("full"),
            text: Cow::Borrowed("Full credit (1.0 or more)"),
        },
        SelectEntry {
            value: Cow::Borrowed("partial"),
            text: Cow::Borrowed("Partial credit (less than 1.0)"),
        },
        SelectEntry {
            value: Cow::Borrowed("exact"),
            text: Cow::Borrowed("Exact credit value"),
        },
    ];

    let fields = CourseSearchFormFields {
        department: SelectTemplate::new(
            &data.department,
            "department",
            &department_entries,
            "Department",
            InputConfiguration::default(),
        )
        .render()?,
        days: [
            ("monday", "Monday", &data.monday),
            ("tuesday", "Tuesday", &data.tuesday),
            ("wednesday", "Wednesday", &data.wednesday),
            ("thursday", "Thursday", &data.thursday),
            ("friday", "Friday", &data.friday),
        ]
        .into_iter()
        .map(|(name, label, value)| {
            Ok(CheckboxTemplate::new(value, name, label, None).render()?)
        })
        .collect::<Result<Vec<String>, AppError>>()?,
        only_days: CheckboxTemplate::new(
            &data.only_days,
            "only_days",
            "Only these days",
            Some("Exclude courses that also meet on other days"),
        )
        .render()?,
        start_time: FormFieldTemplate::new(
            &data.start_time,
            "start_time",
            "Earliest start",
            InputConfiguration::builder()
                .input_type(InputType::Time)
                .build(),
        )
        .render()?,
        end_time: FormFieldTemplate::new(
            &data.end_time,
            "end_time",
            "Latest end",
            InputConfiguration::builder()
                .input_type(InputType::Time)
                .build(),
        )
        .render()?,
        instructor: FormFieldTemplate::new(
            &data.instructor,
            "instructor",
            "Instructor",
            InputConfiguration::default(),
        )
        .render()?,
        min_size: FormFieldTemplate::new(
            &data.min_size,
            "min_size",
            "Minimum class size",
            InputConfiguration::builder()
                .input_type(InputType::Integer)
                .size(InputSize::Small)
                .suffix_text("spots")
                .build(),
        )
        .render()?,
        credit_type: SelectTemplate::new(
            &data.credit_type,
            "credit_type",
            &credit_entries,
            "Credit",
            InputConfiguration::default(),
        )
        .render()?,
        credit_value: FormFieldTemplate::new(
            &data.credit_value,
            "credit_value",
            "Credit value",
            InputConfiguration::builder()
                .size(InputSize::Small)
                .info("Only used with \"Exact credit value\"")
                .build(),
        )
        .render()?,
        keywords: FormFieldTemplate::new(
            &data.keywords,
            "keywords",
            "Keywords",
            InputConfiguration::builder()
                .info("Matched against course names and descriptions")
                .build(),
        )
        .render()?,
        campuses: data
            .campus_fields()
            .into_iter()
            .map(|(name, campus, value)| {
                Ok(CheckboxTemplate::new(value, name, campus.name(), None).render()?)
            })
            .collect::<Result<Vec<String>, AppError>>()?,
    };

    Ok(CourseSearchTemplate {
        base: BaseTemplateContext {
            request: req,
            page_title: "Course search",
            active_section: "courses",
        },
        fields,
        form_error,
        results,
    })
}

/// Pre-rendered form input sub-templates for the course search form
struct CourseSearchFormFields {
    department: String,
    days: Vec<String>,
    only_days: String,
    start_time: String,
    end_time: String,
    instructor: String,
    min_size: String,
    credit_type: String,
    credit_value: String,
    keywords: String,
    campuses: Vec<String>,
}

#[derive(Template)]
#[template(path = "course_search.html")]
struct CourseSearchTemplate<'a> {
    base: BaseTemplateContext<'a>,
    fields: CourseSearchFormFields,
    form_error: Option<&'a str>,
    results: Option<&'a [CourseResultRow]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campus_checkboxes_build_campus_set() {
        let mut data: CourseSearchFormData =
            serde_urlencoded::from_str("search=1&c_po=on&c_sc=on").unwrap();
        let search = data.validate(&vec![]).unwrap().unwrap();
        assert_eq!(search.campuses, vec![Campus::Po, Campus::Sc]);
    }

    #[test]
    fn test_unchecked_campuses_impose_no_constraint() {
        let mut data: CourseSearchFormData =
            serde_urlencoded::from_str("search=1&instructor=lovelace").unwrap();
        let search = data.validate(&vec![]).unwrap().unwrap();
        assert!(search.campuses.is_empty());
    }

    #[test]
    fn test_campuses_alone_are_a_constraint() {
        let mut data: CourseSearchFormData =
            serde_urlencoded::from_str("search=1&c_hm=on").unwrap();
        assert!(matches!(data.validate(&vec![]), Some(Ok(_))));

        let mut empty: CourseSearchFormData = serde_urlencoded::from_str("search=1").unwrap();
        assert!(matches!(empty.validate(&vec![]), Some(Err(_))));
    }
}
