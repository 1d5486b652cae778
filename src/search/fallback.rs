//! Builtin fallback company names
//!
//! Used when neither the registry nor the proxy can be reached, so the
//! fuzzy search always has something to rank.

use crate::company::CompanyRecord;
use std::collections::HashSet;

/// Major UK insurers
const MAJOR_INSURERS: &[&str] = &[
    "Admiral", "Ageas", "Aioi Nissay Dowa Insurance", "Allianz", "Aviva",
    "AXA", "Churchill", "Covéa Insurance", "Direct Line", "Esure",
    "First Central", "Hastings Direct", "Highway Insurance", "Liverpool Victoria (LV=)",
    "Markerstudy", "More Than", "NFU Mutual", "Privilege", "RAC",
    "RSA Insurance Group", "Saga", "Sabre Insurance", "Sheila's Wheels",
    "Tesco Bank", "The AA", "The Co-operative Insurance", "Ticker", "Zurich",
];

/// Regulated insurance firms
const REGISTERED_FIRMS: &[&str] = &[
    "AA Insurance Services", "ABC Insurance", "Abacus Insurance", "Abbey Insurance",
    "Admiral Insurance", "Adrian Flux Insurance Services", "Advantage Insurance",
    "Age Co Insurance", "Ageas Insurance", "AIG Insurance", "Allianz Insurance",
    "Animal Friends Insurance", "Ansvar Insurance", "Aon Insurance", "Arch Insurance",
    "Asda Insurance", "Aspen Insurance", "Assurant Insurance", "Autonet Insurance",
    "Aviva Insurance", "AXA Insurance", "Axis Insurance", "Bankstone Insurance",
];

/// Trade association members
const ASSOCIATION_MEMBERS: &[&str] = &[
    "Be Wiser Insurance", "Bell Insurance", "Berkeley Insurance", "Bewiser Insurance",
    "BGL Insurance", "Bikesure Insurance", "Binomial Insurance", "Birmingham Midshires Insurance",
    "Bluefin Insurance", "BMI Insurance", "Brightside Insurance", "British Insurance",
    "Budget Insurance", "By Miles Insurance", "Canopius Insurance", "Carole Nash Insurance",
    "Carrot Insurance", "Castle Cover Insurance", "Caunce O'Hara Insurance", "CFC Insurance",
    "Chartered Insurance", "Chubb Insurance", "Churchill Insurance", "CIS Insurance",
];

/// Motor insurers
const MOTOR_INSURERS: &[&str] = &[
    "Co-operative Insurance", "Columbus Insurance", "Cornhill Insurance", "Covea Insurance",
    "Covéa Insurance", "Debenhams Insurance", "Diamond Insurance", "Direct Insurance",
    "Direct Line Insurance", "EBike Insurance", "Ecclesiastical Insurance", "Endsleigh Insurance",
    "Equity Insurance", "Esure Insurance", "EUI Insurance", "Everest Insurance",
    "Excess Direct Insurance", "First Central Insurance", "First Directory Insurance",
    "Fish Insurance", "Footman James Insurance", "General Accident Insurance", "Go Skippy Insurance",
    "Groupama Insurance", "Guardian Insurance", "Halifax Insurance", "Hastings Insurance",
];

/// Broker listings
const BROKERS: &[&str] = &[
    "Hedgehog Insurance", "Hiscox Insurance", "Ingenie Insurance", "Insure & Go Insurance",
    "Insure Pink Insurance", "Insure The Box Insurance", "John Lewis Insurance", "Kwik Fit Insurance",
    "L&G Insurance", "Legal & General Insurance", "Liverpool Victoria Insurance", "Lloyds Bank Insurance",
    "LV Insurance", "Marmalade Insurance", "M&S Insurance", "MCE Insurance", "More Than Insurance",
    "Motorcycle Direct Insurance", "Mulsanne Insurance", "Nationwide Insurance", "NFU Mutual Insurance",
    "Ocaso Insurance", "One Call Insurance", "Performance Direct Insurance", "Petplan Insurance",
    "Plantec Assist Insurance", "Post Office Insurance", "Privilege Insurance", "Provident Insurance",
];

/// All builtin names as records, deduplicated by name key, major insurers first
pub fn builtin_fallback() -> Vec<CompanyRecord> {
    let mut seen = HashSet::new();
    [MAJOR_INSURERS, REGISTERED_FIRMS, ASSOCIATION_MEMBERS, MOTOR_INSURERS, BROKERS]
        .iter()
        .flat_map(|list| list.iter())
        .map(|name| CompanyRecord::named(*name))
        .filter(|record| seen.insert(record.key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_has_no_duplicate_keys() {
        let records = builtin_fallback();
        let keys: HashSet<String> = records.iter().map(|r| r.key()).collect();
        assert_eq!(keys.len(), records.len());
    }

    #[test]
    fn test_major_insurers_come_first() {
        let records = builtin_fallback();
        assert_eq!(records[0].name, "Admiral");
        // "Covéa Insurance" appears in two lists but only once here
        let covea = records.iter().filter(|r| r.name == "Covéa Insurance").count();
        assert_eq!(covea, 1);
    }
}
