//! Filing report capabilities: PDF eligibility and links.

use std::fmt;

use crate::query::row::Row;
use crate::query::value::Value;

/// Earliest report year with scanned filings available.
pub const FIRST_PDF_YEAR: i64 = 1993;
/// House committees were scanned from 1996.
pub const FIRST_HOUSE_PDF_YEAR: i64 = 1996;
/// Senate committees were scanned from 2000.
pub const FIRST_SENATE_PDF_YEAR: i64 = 2000;

/// Datasets of filed reports: each row gets `report_form` and `pdf_url`.
pub trait Reportable: Send + Sync + fmt::Debug {
    /// Form name the reports in this dataset are filed on.
    fn report_form(&self) -> &'static str;

    /// Eager-loaded relation the eligibility rule reads, if any.
    fn relation(&self) -> Option<&str> {
        None
    }

    fn has_pdf(&self, row: &Row) -> bool {
        default_has_pdf(row)
    }

    fn pdf_url(&self, row: &Row, base_url: &str) -> Option<String> {
        if !self.has_pdf(row) {
            return None;
        }
        report_pdf_url(base_url, row.get("beginning_image_number"))
    }

    /// Add the derived report fields to `row`.
    fn annotate(&self, row: &mut Row, base_url: &str) {
        let url = self.pdf_url(row, base_url);
        row.insert("report_form", self.report_form());
        row.insert("pdf_url", Value::from(url));
    }
}

pub fn default_has_pdf(row: &Row) -> bool {
    report_year(row).is_some_and(|year| year >= FIRST_PDF_YEAR)
}

fn report_year(row: &Row) -> Option<i64> {
    row.get("report_year").as_i64()
}

/// `{base}/{last three digits}/{image}/{image}.pdf`
pub fn report_pdf_url(base_url: &str, image_number: &Value) -> Option<String> {
    let image = image_number.to_cursor_string()?;
    if image.is_empty() {
        return None;
    }
    let tail = &image[image.len().saturating_sub(3)..];
    Some(format!("{base_url}/{tail}/{image}/{image}.pdf"))
}

/// Reports eligible under the default year rule.
#[derive(Debug, Clone, Copy)]
pub struct StandardReports {
    pub form: &'static str,
}

impl Reportable for StandardReports {
    fn report_form(&self) -> &'static str {
        self.form
    }
}

/// House and Senate candidate committee reports. Eligibility depends on the
/// committee type of the eager-loaded committee.
#[derive(Debug, Clone, Copy)]
pub struct HouseSenateReports {
    pub relation: &'static str,
}

impl Default for HouseSenateReports {
    fn default() -> Self {
        Self {
            relation: "committee",
        }
    }
}

impl Reportable for HouseSenateReports {
    fn report_form(&self) -> &'static str {
        "Form 3"
    }

    fn relation(&self) -> Option<&str> {
        Some(self.relation)
    }

    fn has_pdf(&self, row: &Row) -> bool {
        let Some(year) = report_year(row) else {
            return false;
        };
        let Some(Some(committee)) = row.related(self.relation) else {
            return false;
        };
        match committee.get("committee_type").as_text() {
            Some("H") => year >= FIRST_HOUSE_PDF_YEAR,
            Some("S") => year >= FIRST_SENATE_PDF_YEAR,
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const BASE: &str = "http://docquery.fec.gov/pdf";

    fn report(year: i64) -> Row {
        Row::new()
            .with("report_year", year)
            .with("beginning_image_number", 201_501_159_000_123_i64)
    }

    fn with_committee(mut row: Row, committee_type: &str) -> Row {
        row.set_related(
            "committee",
            Some(Row::new().with("committee_type", committee_type)),
        );
        row
    }

    #[test]
    fn pdf_url_uses_last_three_digits() {
        let url = report_pdf_url(BASE, &Value::Integer(201_501_159_000_123)).unwrap();
        assert_eq!(
            url,
            "http://docquery.fec.gov/pdf/123/201501159000123/201501159000123.pdf"
        );
        assert!(report_pdf_url(BASE, &Value::Null).is_none());
    }

    #[test]
    fn default_eligibility_starts_1993() {
        let reports = StandardReports { form: "Form 3X" };
        assert!(!reports.has_pdf(&report(1992)));
        assert!(reports.has_pdf(&report(1993)));
        assert!(!reports.has_pdf(&Row::new()));
    }

    #[test]
    fn house_senate_eligibility_by_committee_type() {
        let reports = HouseSenateReports::default();
        assert!(!reports.has_pdf(&with_committee(report(1995), "H")));
        assert!(reports.has_pdf(&with_committee(report(1996), "H")));
        assert!(!reports.has_pdf(&with_committee(report(1999), "S")));
        assert!(reports.has_pdf(&with_committee(report(2000), "S")));
        assert!(!reports.has_pdf(&with_committee(report(2010), "P")));
        assert!(!reports.has_pdf(&report(2010)));
    }

    #[test]
    fn annotate_adds_form_and_url() {
        let mut row = report(1990);
        StandardReports { form: "Form 3P" }.annotate(&mut row, BASE);
        assert_eq!(row.get("report_form").as_text(), Some("Form 3P"));
        assert!(row.get("pdf_url").is_null());

        let mut row = with_committee(report(2004), "S");
        HouseSenateReports::default().annotate(&mut row, BASE);
        assert_eq!(row.get("report_form").as_text(), Some("Form 3"));
        assert!(row.get("pdf_url").as_text().unwrap().ends_with(".pdf"));
    }
}
