//! Built-in dataset registrations.
//!
//! Itemized disbursements, the four committee report families, and the
//! reporting and election calendars.

use super::decoders::ELECTION_TYPES;
use super::reports::{HouseSenateReports, StandardReports};
use super::{
    Catalog, ColumnKind, CountStrategy, DatasetDef, DecodedColumn, DirectionCapability,
    EagerLoad, FilterSpec, SortDirection, SortSpec,
};
use crate::error::ConfigurationError;
use crate::query::predicate::{CompareOp, Predicate};

/// Planner estimates at or above this are reported instead of counting.
pub const ESTIMATE_THRESHOLD: u64 = 500_000;

const COMMITTEE_TABLE: &str = "ofec_committee_detail";

/// Register every built-in dataset. `itemized_start_year` is the earliest
/// `report_year` served from itemized schedules.
pub fn builtin_catalog(itemized_start_year: i32) -> Result<Catalog, ConfigurationError> {
    let mut builder = Catalog::builder().register(schedule_b(itemized_start_year))?;
    for def in [
        committee_reports("reports_house_senate", "ofec_reports_house_senate_mv")
            .columns(
                ColumnKind::Integer,
                &[
                    "candidate_contribution_period",
                    "candidate_contribution_ytd",
                    "net_contributions_period",
                    "net_operating_expenditures_period",
                    "operating_expenditures_period",
                    "total_loans_received_period",
                ],
            )
            .reportable(HouseSenateReports::default()),
        committee_reports("reports_pac_party", "ofec_reports_pacs_parties_mv")
            .columns(
                ColumnKind::Integer,
                &[
                    "independent_expenditures_period",
                    "coordinated_expenditures_by_party_committee_period",
                    "net_contributions_period",
                    "total_fed_receipts_period",
                    "total_fed_disbursements_period",
                ],
            )
            .reportable(StandardReports { form: "Form 3X" }),
        committee_reports("reports_presidential", "ofec_reports_presidential_mv")
            .columns(
                ColumnKind::Integer,
                &[
                    "candidate_contribution_period",
                    "federal_funds_period",
                    "fundraising_disbursements_period",
                    "total_period",
                ],
            )
            .columns(
                ColumnKind::Decimal,
                &[
                    "net_contributions_cycle_to_date",
                    "net_operating_expenditures_cycle_to_date",
                ],
            )
            .reportable(StandardReports { form: "Form 3P" }),
        ie_only_reports(),
        reporting_dates(),
        election_dates(),
    ] {
        builder = builder.register(def)?;
    }
    Ok(builder.build())
}

fn committee_lookup(name: &str, local_column: &str) -> EagerLoad {
    EagerLoad::new(name, local_column, COMMITTEE_TABLE, "committee_id")
        .column("committee_id", ColumnKind::Text)
        .column("name", ColumnKind::Text)
        .column("committee_type", ColumnKind::Text)
        .column("designation", ColumnKind::Text)
}

/// Schedule B: itemized disbursements.
fn schedule_b(itemized_start_year: i32) -> DatasetDef {
    DatasetDef::new("schedule_b", "ofec_sched_b")
        .index("sched_b_sk")
        .column("sched_b_sk", ColumnKind::Integer)
        .columns(
            ColumnKind::Text,
            &[
                "committee_id",
                "recipient_committee_id",
                "recipient_name",
                "recipient_city",
                "recipient_state",
                "recipient_zip",
                "disbursement_description",
                "disbursement_type",
                "memo_text",
                "image_number",
                "line_number",
                "transaction_id",
                "file_number",
                "report_type",
            ],
        )
        .columns(
            ColumnKind::TextSearch,
            &["recipient_name_text", "disbursement_description_text"],
        )
        .column("disbursement_date", ColumnKind::Date)
        .column("disbursement_amount", ColumnKind::Decimal)
        .required_column("report_year", ColumnKind::Integer)
        .column("load_date", ColumnKind::Timestamp)
        .filter(FilterSpec::exact("image_number"))
        .filter(FilterSpec::exact("committee_id"))
        .filter(FilterSpec::exact("recipient_city"))
        .filter(FilterSpec::exact("recipient_state"))
        .filter(FilterSpec::exact("recipient_committee_id"))
        .filter(FilterSpec::fulltext("recipient_name", "recipient_name_text"))
        .filter(FilterSpec::fulltext(
            "disbursement_description",
            "disbursement_description_text",
        ))
        .filter(FilterSpec::range("date", "disbursement_date"))
        .filter(FilterSpec::range("amount", "disbursement_amount"))
        .filter(FilterSpec::range("image_number", "image_number"))
        .sort(SortSpec::both("disbursement_date"))
        .sort(SortSpec::both("disbursement_amount"))
        .eager_load(committee_lookup("committee", "committee_id"))
        .eager_load(committee_lookup("recipient_committee", "recipient_committee_id"))
        .count(CountStrategy::Estimated {
            exact_below: ESTIMATE_THRESHOLD,
        })
        .base_filter(Predicate::compare(
            "report_year",
            CompareOp::Gte,
            i64::from(itemized_start_year),
        ))
}

/// Columns and capabilities shared by the Form 3 / 3X / 3P report families.
fn committee_reports(name: &str, table: &str) -> DatasetDef {
    DatasetDef::new(name, table)
        .index("idx")
        .column("idx", ColumnKind::Integer)
        .column("report_key", ColumnKind::Integer)
        .columns(
            ColumnKind::Text,
            &["committee_id", "report_type", "report_type_full"],
        )
        .columns(
            ColumnKind::Integer,
            &[
                "cycle",
                "report_year",
                "beginning_image_number",
                "end_image_number",
                "cash_on_hand_beginning_period",
                "cash_on_hand_end_period",
                "debts_owed_by_committee",
                "debts_owed_to_committee",
                "total_contributions_period",
                "total_contributions_ytd",
                "total_disbursements_period",
                "total_disbursements_ytd",
                "total_receipts_period",
                "total_receipts_ytd",
                "total_individual_contributions_period",
                "total_individual_contributions_ytd",
            ],
        )
        .columns(
            ColumnKind::Timestamp,
            &["coverage_start_date", "coverage_end_date", "expire_date"],
        )
        .filter(FilterSpec::exact("committee_id"))
        .filter(FilterSpec::exact("cycle"))
        .filter(FilterSpec::exact_as("year", "report_year"))
        .filter(FilterSpec::exact("report_type"))
        .filter(FilterSpec::exact("beginning_image_number"))
        .filter(FilterSpec::range("receipts", "total_receipts_period"))
        .filter(FilterSpec::range("disbursements", "total_disbursements_period"))
        .filter(FilterSpec::range("cash_on_hand_end_period", "cash_on_hand_end_period"))
        .filter(FilterSpec::range("coverage_end_date", "coverage_end_date"))
        .sort(SortSpec::both("coverage_end_date"))
        .sort(SortSpec::both("coverage_start_date"))
        .sort(SortSpec::both("report_year"))
        .sort(SortSpec::both("cycle"))
        .sort(SortSpec::both("total_receipts_period"))
        .sort(SortSpec::both("total_disbursements_period"))
        .sort(SortSpec::both("cash_on_hand_end_period"))
        .default_sort("coverage_end_date", SortDirection::Desc)
        .multi_sort(true)
        .eager_load(committee_lookup("committee", "committee_id"))
        .count(CountStrategy::Exact)
}

/// Form 5: independent-expenditure-only filers.
fn ie_only_reports() -> DatasetDef {
    DatasetDef::new("reports_ie_only", "ofec_reports_ie_only_mv")
        .index("idx")
        .column("idx", ColumnKind::Integer)
        .columns(
            ColumnKind::Text,
            &[
                "committee_id",
                "election_type",
                "election_type_full",
                "report_type",
                "report_type_full",
            ],
        )
        .columns(
            ColumnKind::Integer,
            &[
                "cycle",
                "report_year",
                "beginning_image_number",
                "end_image_number",
                "independent_contributions_period",
                "independent_expenditures_period",
            ],
        )
        .columns(
            ColumnKind::Timestamp,
            &["coverage_start_date", "coverage_end_date"],
        )
        .filter(FilterSpec::exact("committee_id"))
        .filter(FilterSpec::exact("cycle"))
        .filter(FilterSpec::exact_as("year", "report_year"))
        .filter(FilterSpec::exact("report_type"))
        .filter(FilterSpec::exact("beginning_image_number"))
        .sort(SortSpec::both("coverage_end_date"))
        .sort(SortSpec::both("report_year"))
        .sort(SortSpec::both("independent_expenditures_period"))
        .default_sort("coverage_end_date", SortDirection::Desc)
        .multi_sort(true)
        .eager_load(committee_lookup("committee", "committee_id"))
        .count(CountStrategy::Exact)
        .reportable(StandardReports { form: "Form 5" })
}

/// Filing deadlines per report type and year.
fn reporting_dates() -> DatasetDef {
    DatasetDef::new("reporting_dates", "trc_report_due_date")
        .index("trc_report_due_date_id")
        .column("trc_report_due_date_id", ColumnKind::Integer)
        .required_column("report_year", ColumnKind::Integer)
        .column("report_type", ColumnKind::Text)
        .columns(ColumnKind::Date, &["due_date", "create_date", "update_date"])
        .filter(FilterSpec::exact("report_year"))
        .filter(FilterSpec::exact("report_type"))
        .filter(FilterSpec::range("due_date", "due_date"))
        .sort(SortSpec::both("due_date"))
        .sort(SortSpec::both("report_year"))
        .sort(SortSpec::both("report_type"))
        .default_sort("due_date", SortDirection::Desc)
        .multi_sort(true)
        .count(CountStrategy::Exact)
}

/// Election calendar.
fn election_dates() -> DatasetDef {
    DatasetDef::new("election_dates", "trc_election")
        .index("trc_election_id")
        .column("trc_election_id", ColumnKind::Integer)
        .columns(
            ColumnKind::Text,
            &[
                "election_state",
                "election_party",
                "office_sought",
                "election_notes",
                "trc_election_type_id",
                "trc_election_status_id",
            ],
        )
        .columns(ColumnKind::Integer, &["election_district", "election_yr"])
        .columns(
            ColumnKind::Date,
            &["election_date", "create_date", "update_date", "pg_date"],
        )
        .filter(FilterSpec::exact("election_state"))
        .filter(FilterSpec::exact("election_district"))
        .filter(FilterSpec::exact("election_party"))
        .filter(FilterSpec::exact("office_sought"))
        .filter(FilterSpec::exact_as("election_year", "election_yr"))
        .filter(FilterSpec::exact_as("election_type_id", "trc_election_type_id"))
        .filter(FilterSpec::range("election_date", "election_date"))
        .sort(SortSpec::both("election_date"))
        .sort(SortSpec {
            field: "election_year".to_string(),
            column: "election_yr".to_string(),
            capability: DirectionCapability::Both,
        })
        .sort(SortSpec::both("election_state"))
        .sort(SortSpec::both("office_sought"))
        .default_sort("election_date", SortDirection::Desc)
        .multi_sort(true)
        .count(CountStrategy::Exact)
        .decoded(DecodedColumn::new(
            "election_type_full",
            "trc_election_type_id",
            ELECTION_TYPES,
        ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::query::row::Row;

    #[test]
    fn builtin_catalog_registers() {
        let catalog = builtin_catalog(2011).unwrap();
        assert_eq!(catalog.len(), 7);

        let sched_b = catalog.dataset("schedule_b").unwrap();
        assert_eq!(sched_b.index_column(), "sched_b_sk");
        assert!(!sched_b.multi_sort());
        assert_eq!(sched_b.eager_loads().len(), 2);
        assert!(sched_b.base_filter().is_some());
        assert!(!sched_b.column("report_year").unwrap().nullable);
        assert!(sched_b.column("disbursement_date").unwrap().nullable);

        let due_dates = catalog.dataset("reporting_dates").unwrap();
        assert!(!due_dates.column("report_year").unwrap().nullable);
        assert!(matches!(
            catalog.lookup("schedule_b", "min_amount").unwrap(),
            FilterSpec::Range { .. }
        ));
        assert!(matches!(
            catalog.lookup("schedule_b", "recipient_name").unwrap(),
            FilterSpec::Fulltext { .. }
        ));
    }

    #[test]
    fn report_families_carry_forms() {
        let catalog = builtin_catalog(2011).unwrap();
        for (name, form) in [
            ("reports_house_senate", "Form 3"),
            ("reports_pac_party", "Form 3X"),
            ("reports_presidential", "Form 3P"),
            ("reports_ie_only", "Form 5"),
        ] {
            let dataset = catalog.dataset(name).unwrap();
            assert_eq!(dataset.reportable().unwrap().report_form(), form);
            assert_eq!(
                dataset.default_sort(),
                &[("coverage_end_date".to_string(), SortDirection::Desc)]
            );
        }
    }

    #[test]
    fn election_type_is_decoded() {
        let catalog = builtin_catalog(2011).unwrap();
        let dataset = catalog.dataset("election_dates").unwrap();
        let mut row = Row::new().with("trc_election_type_id", "SP");
        for decoded in dataset.decoded_columns() {
            decoded.decode(&mut row);
        }
        assert_eq!(row.get("election_type_full").as_text(), Some("Special Primary"));
    }
}
