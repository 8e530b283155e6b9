//! Fills the fields a user did not mention with consistent synthetic values.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDateTime};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, warn};

use crate::models::{ClaimCreate, PartialClaim};

pub const ADJUSTER_NAMES: &[&str] = &[
    "Ryan Cooper",
    "Olivia Harris",
    "Daniel Brooks",
    "Chloe Bennett",
    "Ethan Carter",
    "Mia Foster",
    "Noah Evans",
    "Ava Green",
    "Liam Jenkins",
    "Isabella King",
];

pub const STATUSES: &[&str] = &["Submitted", "Approved", "Rejected", "Repair in Progress"];

pub const COMPANY_OFFICES: &[(&str, &[&str])] = &[
    (
        "Alpha Insurance",
        &["Chicago Office", "Los Angeles Office", "New York Office"],
    ),
    (
        "Beta Insurance",
        &["Houston Office", "Miami Office", "Phoenix Office"],
    ),
    (
        "Delta Insurance",
        &["Atlanta Office", "Dallas Office", "San Francisco Office"],
    ),
    (
        "Gamma Insurance",
        &["Boston Office", "Denver Office", "Seattle Office"],
    ),
];

pub const DEFAULT_VEHICLES: &[(&str, &str, i32)] = &[
    ("Toyota", "Camry", 2020),
    ("Honda", "Civic", 2021),
    ("Ford", "F-150", 2019),
    ("Chevrolet", "Malibu", 2022),
    ("Nissan", "Altima", 2018),
];

pub const DEFAULT_DESCRIPTIONS: &[&str] = &[
    "Minor collision in parking lot.",
    "Side-swiped while parked on the street.",
    "Hit a pothole causing tire damage.",
    "Hail damage to roof and hood.",
    "Scratched by unknown object.",
];

pub const DEFAULT_IMPACTS: &[&str] = &[
    "Front bumper",
    "Rear bumper",
    "Driver side door",
    "Passenger side door",
    "Windshield",
    "Roof",
];

const FIRST_NAMES: &[&str] = &[
    "James", "Maria", "Robert", "Linda", "Michael", "Sofia", "David", "Grace", "Carlos",
    "Hannah", "Kevin", "Priya", "Thomas", "Elena", "Marcus", "Naomi",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Garcia", "Johnson", "Nguyen", "Williams", "Patel", "Brown", "Martinez", "Davis",
    "Kim", "Wilson", "Lopez", "Anderson", "Clark", "Lewis", "Walker",
];

/// 2025-01-01T00:00:00 and 2025-03-31T23:59:59, as unix seconds
const INCIDENT_WINDOW_START: i64 = 1_735_689_600;
const INCIDENT_WINDOW_END: i64 = 1_743_465_599;

/// Offices belonging to a known company
pub fn offices_for(company: &str) -> Option<&'static [&'static str]> {
    COMPANY_OFFICES
        .iter()
        .find(|(name, _)| *name == company)
        .map(|(_, offices)| *offices)
}

/// Company that owns the given office, if any
pub fn company_for_office(office: &str) -> Option<&'static str> {
    COMPANY_OFFICES
        .iter()
        .find(|(_, offices)| offices.contains(&office))
        .map(|(name, _)| *name)
}

/// How the company/office pair of a partial claim is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeCase {
    /// Known company with one of its own offices: both kept
    KnownCompanyValidOffice,
    /// Known company, office absent or belonging elsewhere: office redrawn
    KnownCompanyOfficeRedrawn,
    /// Unrecognized company: discarded along with the office
    UnknownCompanyDiscarded,
    /// No company, office matches a known company: company inferred
    CompanyInferredFromOffice,
    /// No company, office absent or unmatched: both drawn
    RandomAssignment,
}

impl OfficeCase {
    pub fn classify(company: Option<&str>, office: Option<&str>) -> Self {
        match (company, office) {
            (Some(company), office) => match offices_for(company) {
                Some(offices) if office.is_some_and(|o| offices.contains(&o)) => {
                    OfficeCase::KnownCompanyValidOffice
                }
                Some(_) => OfficeCase::KnownCompanyOfficeRedrawn,
                None => OfficeCase::UnknownCompanyDiscarded,
            },
            (None, Some(office)) if company_for_office(office).is_some() => {
                OfficeCase::CompanyInferredFromOffice
            }
            (None, _) => OfficeCase::RandomAssignment,
        }
    }
}

/// Resolved company/office pair. `office` always belongs to `company`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficeAssignment {
    pub case: OfficeCase,
    pub company: String,
    pub office: String,
}

pub fn resolve_company_office<R: Rng + ?Sized>(
    company: Option<&str>,
    office: Option<&str>,
    rng: &mut R,
) -> OfficeAssignment {
    let case = OfficeCase::classify(company, office);
    let (company, office) = match (case, company, office) {
        (OfficeCase::KnownCompanyValidOffice, Some(company), Some(office)) => {
            (company.to_string(), office.to_string())
        }
        (OfficeCase::KnownCompanyOfficeRedrawn, Some(company), _) => {
            let offices = offices_for(company).unwrap_or_default();
            (company.to_string(), pick(rng, offices).to_string())
        }
        (OfficeCase::CompanyInferredFromOffice, None, Some(office)) => {
            let company = company_for_office(office).unwrap_or_default();
            (company.to_string(), office.to_string())
        }
        _ => random_company_office(rng),
    };
    OfficeAssignment {
        case,
        company,
        office,
    }
}

fn random_company_office<R: Rng + ?Sized>(rng: &mut R) -> (String, String) {
    let (company, offices) = COMPANY_OFFICES[rng.random_range(0..COMPANY_OFFICES.len())];
    (company.to_string(), pick(rng, offices).to_string())
}

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, pool: &[&'a str]) -> &'a str {
    pool[rng.random_range(0..pool.len())]
}

fn provided(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

pub fn generate_policy_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("POL-{}", rng.random_range(100_000..=999_999))
}

pub fn generate_incident_date<R: Rng + ?Sized>(rng: &mut R) -> NaiveDateTime {
    let seconds = rng.random_range(INCIDENT_WINDOW_START..=INCIDENT_WINDOW_END);
    DateTime::from_timestamp(seconds, 0)
        .unwrap_or_default()
        .naive_utc()
}

pub fn generate_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))
}

/// Builds a complete claim from `partial` using `rng` for every absent field.
///
/// Fields that are present (non-blank, non-zero year) are copied verbatim. The
/// default vehicle is drawn once, so absent make/model/year always come from
/// the same default triple.
pub fn synthesize_with<R: Rng + ?Sized>(partial: &PartialClaim, rng: &mut R) -> ClaimCreate {
    let policy_holder_name = provided(&partial.policy_holder_name)
        .map(str::to_string)
        .unwrap_or_else(|| generate_name(rng));
    let policy_number = provided(&partial.policy_number)
        .map(str::to_string)
        .unwrap_or_else(|| generate_policy_number(rng));

    let (default_make, default_model, default_year) =
        DEFAULT_VEHICLES[rng.random_range(0..DEFAULT_VEHICLES.len())];
    let vehicle_make = provided(&partial.vehicle_make).unwrap_or(default_make);
    let vehicle_model = provided(&partial.vehicle_model).unwrap_or(default_model);
    let vehicle_year = partial
        .vehicle_year
        .filter(|year| *year != 0)
        .unwrap_or(default_year);

    let incident_date = partial
        .incident_date
        .unwrap_or_else(|| generate_incident_date(rng));
    let incident_description = provided(&partial.incident_description)
        .unwrap_or_else(|| pick(rng, DEFAULT_DESCRIPTIONS))
        .to_string();
    let point_of_impact = provided(&partial.point_of_impact)
        .unwrap_or_else(|| pick(rng, DEFAULT_IMPACTS))
        .to_string();
    let adjuster_name = provided(&partial.adjuster_name)
        .unwrap_or_else(|| pick(rng, ADJUSTER_NAMES))
        .to_string();
    let status = provided(&partial.status)
        .unwrap_or_else(|| pick(rng, STATUSES))
        .to_string();

    let requested_company = provided(&partial.company);
    let assignment =
        resolve_company_office(requested_company, provided(&partial.claim_office), rng);
    match assignment.case {
        OfficeCase::UnknownCompanyDiscarded => warn!(
            requested_company = ?requested_company,
            assigned_company = %assignment.company,
            "Unrecognized company discarded; assigned a known company"
        ),
        case => debug!(
            case = ?case,
            company = %assignment.company,
            office = %assignment.office,
            "Resolved company and claim office"
        ),
    }

    ClaimCreate {
        policy_holder_name,
        policy_number,
        vehicle_make: vehicle_make.to_string(),
        vehicle_model: vehicle_model.to_string(),
        vehicle_year,
        incident_date,
        incident_description,
        adjuster_name,
        status,
        company: assignment.company,
        claim_office: assignment.office,
        point_of_impact,
    }
}

/// Synthesizer owning its random source
pub struct ClaimSynthesizer {
    rng: Mutex<StdRng>,
}

impl ClaimSynthesizer {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn synthesize(&self, partial: &PartialClaim) -> ClaimCreate {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        synthesize_with(partial, &mut *rng)
    }
}

impl Default for ClaimSynthesizer {
    fn default() -> Self {
        Self::from_entropy()
    }
}
