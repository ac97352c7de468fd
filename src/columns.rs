use crate::record::Field;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub field: Field,
    pub header_name: String,
    pub min_width: usize,
    pub highlighted: bool,
}

impl ColumnDescriptor {
    pub fn new(field: Field, header_name: &str, min_width: usize) -> Self {
        Self {
            field,
            header_name: header_name.to_string(),
            min_width,
            highlighted: false,
        }
    }
}

/// The columns shown by the grid, in declaration order.
pub fn default_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new(Field::Athlete, "Athlete", 22),
        ColumnDescriptor::new(Field::Country, "Country", 20),
        ColumnDescriptor::new(Field::Year, "Year", 10),
        ColumnDescriptor::new(Field::Sport, "Sport", 20),
        ColumnDescriptor::new(Field::Gold, "Gold", 10),
        ColumnDescriptor::new(Field::Silver, "Silver", 10),
        ColumnDescriptor::new(Field::Bronze, "Bronze", 10),
        ColumnDescriptor::new(Field::Total, "Total", 10),
    ]
}
