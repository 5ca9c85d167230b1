/// Source layout and column mapping for the emission report spreadsheets.
///
/// The source labels are the raw header texts, unit annotations included.

/// Spreadsheet file extension picked up by the source reader
pub const SPREADSHEET_EXTENSION: &str = "xlsx";

/// 0-based sheet row holding the column headers
pub const HEADER_ROW: usize = 2;

/// Text the reports put in place of an uncomputable emission ratio
pub const DIVISION_BY_ZERO_SENTINEL: &str = "Division by zero!";

/// Intermediate date form used by the reports
pub const REPORT_DATE_FORMAT: &str = "%d/%m/%Y";

/// Date form written to the interchange file and accepted by the API
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// The eight fields the pipeline keeps, in interchange column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogicalField {
    Name,
    ShipType,
    ReportingPeriod,
    DocIssueDate,
    DocExpiryDate,
    AnnualAverageCo2Emissions,
    TotalCo2Emissions,
    TechnicalEfficiency,
}

impl LogicalField {
    pub const ALL: [LogicalField; 8] = [
        LogicalField::Name,
        LogicalField::ShipType,
        LogicalField::ReportingPeriod,
        LogicalField::DocIssueDate,
        LogicalField::DocExpiryDate,
        LogicalField::AnnualAverageCo2Emissions,
        LogicalField::TotalCo2Emissions,
        LogicalField::TechnicalEfficiency,
    ];

    /// Normalized name, used as the interchange header and the store column
    pub fn name(self) -> &'static str {
        match self {
            LogicalField::Name => "name",
            LogicalField::ShipType => "ship_type",
            LogicalField::ReportingPeriod => "reporting_period",
            LogicalField::DocIssueDate => "doc_issue_date",
            LogicalField::DocExpiryDate => "doc_expiry_date",
            LogicalField::AnnualAverageCo2Emissions => "annual_average_co2_emissions",
            LogicalField::TotalCo2Emissions => "total_co2_emissions",
            LogicalField::TechnicalEfficiency => "technical_efficiency",
        }
    }

    /// Raw spreadsheet header this field is read from
    pub fn source_label(self) -> &'static str {
        match self {
            LogicalField::Name => "Name",
            LogicalField::ShipType => "Ship type",
            LogicalField::ReportingPeriod => "Reporting Period",
            LogicalField::DocIssueDate => "DoC issue date",
            LogicalField::DocExpiryDate => "DoC expiry date",
            LogicalField::AnnualAverageCo2Emissions => {
                "Annual average CO₂ emissions per distance [kg CO₂ / n mile]"
            }
            LogicalField::TotalCo2Emissions => "Total CO₂ emissions [m tonnes]",
            LogicalField::TechnicalEfficiency => "Technical efficiency",
        }
    }
}

impl std::fmt::Display for LogicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Date columns reformatted in the final pipeline step
pub const DATE_FIELDS: [LogicalField; 3] = [
    LogicalField::DocIssueDate,
    LogicalField::ReportingPeriod,
    LogicalField::DocExpiryDate,
];

// Record API paging bounds
pub const MAX_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_order_matches_interchange_header() {
        let names: Vec<&str> = LogicalField::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec![
                "name",
                "ship_type",
                "reporting_period",
                "doc_issue_date",
                "doc_expiry_date",
                "annual_average_co2_emissions",
                "total_co2_emissions",
                "technical_efficiency",
            ]
        );
    }

    #[test]
    fn source_labels_are_distinct() {
        let mut labels: Vec<&str> = LogicalField::ALL.iter().map(|f| f.source_label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), LogicalField::ALL.len());
    }
}
