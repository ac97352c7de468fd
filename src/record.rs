use serde::Deserialize;

/// One medal winner entry of the olympic dataset.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Record {
    pub athlete: String,
    pub age: Option<u32>,
    pub country: String,
    pub year: u32,
    pub date: Option<String>,
    pub sport: String,
    pub gold: u32,
    pub silver: u32,
    pub bronze: u32,
    pub total: u32,
}

/// Field keys of a [`Record`], the identity of a grid column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Athlete,
    Age,
    Country,
    Year,
    Date,
    Sport,
    Gold,
    Silver,
    Bronze,
    Total,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Athlete,
        Field::Age,
        Field::Country,
        Field::Year,
        Field::Date,
        Field::Sport,
        Field::Gold,
        Field::Silver,
        Field::Bronze,
        Field::Total,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Field::Athlete => "athlete",
            Field::Age => "age",
            Field::Country => "country",
            Field::Year => "year",
            Field::Date => "date",
            Field::Sport => "sport",
            Field::Gold => "gold",
            Field::Silver => "silver",
            Field::Bronze => "bronze",
            Field::Total => "total",
        }
    }

    // Age and date are missing for some entries of the public dataset
    pub fn is_optional(&self) -> bool {
        matches!(self, Field::Age | Field::Date)
    }
}

impl Record {
    pub fn cell(&self, field: Field) -> String {
        match field {
            Field::Athlete => self.athlete.clone(),
            Field::Age => self.age.map(|a| a.to_string()).unwrap_or_else(|| "∅".into()),
            Field::Country => self.country.clone(),
            Field::Year => self.year.to_string(),
            Field::Date => self.date.clone().unwrap_or_else(|| "∅".into()),
            Field::Sport => self.sport.clone(),
            Field::Gold => self.gold.to_string(),
            Field::Silver => self.silver.to_string(),
            Field::Bronze => self.bronze.to_string(),
            Field::Total => self.total.to_string(),
        }
    }
}
