//! Word lists backing the name classifier
//!
//! All entries are upper-case and already normalized (no dots, initialisms collapsed).

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Tokens that force an entity classification wherever they appear
pub(crate) static ENTITY_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "LLC", "LC", "PLLC", "LLP", "LLLP", "LP", "INC", "INCORPORATED", "CORP",
        "CORPORATION", "CO", "COMPANY", "LTD", "LIMITED", "PC", "PA", "NA", "FSB",
        "TRUST", "TRUSTS", "TRUSTEE", "TRUSTEES", "TR", "TRST", "TRS", "HOLDINGS",
        "HOLDING", "PROPERTIES", "INVESTMENTS", "INVESTMENT", "INVESTORS", "CAPITAL",
        "PARTNERS", "PARTNERSHIP", "GROUP", "ENTERPRISES", "VENTURES", "MANAGEMENT",
        "MGMT", "REALTY", "ASSOCIATES", "ASSOCIATION", "ASSN", "FUND", "BANK",
        "FOUNDATION", "CHURCH", "MINISTRIES", "SERVICES", "DEVELOPMENT", "DEVELOPERS",
        "REIT", "ESTATE", "AUTHORITY", "COUNTY", "DISTRICT", "UNIVERSITY", "SCHOOL",
        "HOSPITAL", "RENTALS", "ACQUISITIONS", "SOLUTIONS", "CONSTRUCTION",
        "INDUSTRIES", "INTERNATIONAL", "GLOBAL", "AGENCY", "MORTGAGE", "FINANCIAL",
        "LENDING", "CREDIT", "EQUITY", "HOUSING", "TOWNHOMES", "APARTMENTS",
    ]
    .into_iter()
    .collect()
});

/// Trailing tokens stripped to build the suffix-free identity of an entity
pub(crate) static ENTITY_SUFFIXES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "LLC", "LC", "PLLC", "LLP", "LLLP", "LP", "INC", "INCORPORATED", "CORP",
        "CORPORATION", "CO", "COMPANY", "LTD", "LIMITED", "PC", "PA",
    ]
    .into_iter()
    .collect()
});

/// Words that make a trailing token read as a business rather than a surname
pub(crate) static BUSINESS_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "HOMES", "LAND", "RENTAL", "REAL", "PROPERTY", "STORAGE", "MOTORS", "AUTO",
        "FARMS", "FARM", "RANCH", "PLAZA", "CENTER", "CENTRE", "MARKET", "STORE",
        "SHOP", "STUDIO", "DESIGN", "CONSULTING", "PROPERTYS", "INVEST", "RESIDENTIAL",
        "COMMERCIAL", "PARTNER", "HOLDCO", "OPCO", "ASSETS", "PORTFOLIO", "VILLAS",
        "LOFTS", "TOWERS", "GARDENS", "COMMONS", "POINTE", "XPRESS", "EXPRESS",
    ]
    .into_iter()
    .chain(ENTITY_KEYWORDS.iter().copied())
    .collect()
});

/// Generational suffixes ignored by the person test
pub(crate) static GENERATIONAL_SUFFIXES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["JR", "SR", "II", "III", "IV", "V", "ESQ", "MD", "PHD", "DDS"]
        .into_iter()
        .collect()
});

/// Common US given names
pub(crate) static FIRST_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "AARON", "ADAM", "ALAN", "ALBERT", "ALEX", "ALEXANDER", "ALICE", "ALLEN",
        "ALLISON", "AMANDA", "AMY", "ANDREA", "ANDREW", "ANGELA", "ANN", "ANNA",
        "ANNE", "ANTHONY", "ANTONIO", "ARTHUR", "ASHLEY", "BARBARA", "BENJAMIN",
        "BETTY", "BEVERLY", "BILL", "BOB", "BRADLEY", "BRANDON", "BRENDA", "BRIAN",
        "BRUCE", "BRYAN", "CARL", "CARLOS", "CAROL", "CAROLYN", "CATHERINE",
        "CHARLES", "CHARLOTTE", "CHERYL", "CHRIS", "CHRISTIAN", "CHRISTINA",
        "CHRISTINE", "CHRISTOPHER", "CYNTHIA", "DANIEL", "DANIELLE", "DAVID",
        "DEBORAH", "DEBRA", "DENISE", "DENNIS", "DIANA", "DIANE", "DONALD", "DONNA",
        "DORIS", "DOROTHY", "DOUGLAS", "DYLAN", "EDWARD", "ELIZABETH", "EMILY",
        "EMMA", "ERIC", "ETHAN", "EUGENE", "EVELYN", "FRANCES", "FRANCISCO", "FRANK",
        "GARY", "GEORGE", "GERALD", "GLORIA", "GRACE", "GREGORY", "HAROLD", "HANNAH",
        "HEATHER", "HELEN", "HENRY", "JACK", "JACOB", "JACQUELINE", "JAKE", "JAMES",
        "JANE", "JANET", "JANICE", "JASON", "JEAN", "JEFFREY", "JENNIFER", "JEREMY",
        "JERRY", "JESSE", "JESSICA", "JOAN", "JOE", "JOHN", "JONATHAN", "JORGE",
        "JOSE", "JOSEPH", "JOSHUA", "JOYCE", "JUAN", "JUDITH", "JUDY", "JULIA",
        "JULIE", "JUSTIN", "KAREN", "KATHERINE", "KATHLEEN", "KATHY", "KAYLA",
        "KEITH", "KELLY", "KENNETH", "KEVIN", "KIMBERLY", "KYLE", "LARRY", "LAURA",
        "LAUREN", "LAWRENCE", "LINDA", "LISA", "LOGAN", "LORI", "LOUIS", "LUIS",
        "MADISON", "MARGARET", "MARIA", "MARIE", "MARILYN", "MARK", "MARTHA",
        "MARY", "MATTHEW", "MEGAN", "MELISSA", "MICHAEL", "MICHELLE", "MIGUEL",
        "MIKE", "NANCY", "NATHAN", "NICHOLAS", "NICOLE", "NOAH", "OLIVIA", "PAMELA",
        "PATRICIA", "PATRICK", "PAUL", "PETER", "PHILIP", "PHILLIP", "RACHEL",
        "RALPH", "RANDY", "RAYMOND", "REBECCA", "RICHARD", "ROBERT", "ROGER",
        "RONALD", "ROSE", "ROY", "RUSSELL", "RUTH", "RYAN", "SAMANTHA", "SAMUEL",
        "SANDRA", "SARA", "SARAH", "SCOTT", "SEAN", "SHARON", "SHIRLEY", "SOPHIA",
        "STEPHANIE", "STEPHEN", "STEVEN", "SUSAN", "TERESA", "TERRY", "THERESA",
        "THOMAS", "TIMOTHY", "TODD", "TONY", "TYLER", "VICTORIA", "VINCENT",
        "VIRGINIA", "WALTER", "WAYNE", "WILLIAM", "WILLIE", "ZACHARY",
    ]
    .into_iter()
    .collect()
});

/// Registered-agent and compliance-service names that mask real principals
pub(crate) const PRIVACY_AGENTS: &[&str] = &[
    "CORPORATION SERVICE COMPANY",
    "CSC",
    "CSC GLOBAL",
    "CT CORPORATION SYSTEM",
    "CT CORPORATION",
    "NATIONAL REGISTERED AGENTS",
    "NORTHWEST REGISTERED AGENT",
    "REGISTERED AGENTS INC",
    "REGISTERED AGENT SOLUTIONS",
    "INCORP SERVICES",
    "INCORPORATING SERVICES",
    "COGENCY GLOBAL",
    "UNITED STATES CORPORATION AGENTS",
    "UNITED AGENT GROUP",
    "HARBOR COMPLIANCE",
    "LEGALZOOM",
    "ZENBUSINESS",
    "BUSINESS FILINGS INCORPORATED",
    "PARACORP",
    "VCORP SERVICES",
    "A REGISTERED AGENT",
    "SPIEGEL UTRERA",
    "CORPORATE CREATIONS NETWORK",
    "CORPORATION TRUST COMPANY",
];

/// Phrases that mark a registry officer entry as placeholder text
pub(crate) const PLACEHOLDER_PHRASES: &[&str] = &[
    "POSITIONS INCLUDE",
    "INFORMATION ON FILE",
    "SEE DOCUMENT",
    "REFER TO",
    "AVAILABLE UPON REQUEST",
    "NOT AVAILABLE",
    "AS PER",
    "LISTED IN",
    "FILED WITH",
    "SAME AS",
    "SEE ABOVE",
    "SEE BELOW",
    "TO BE UPDATED",
    "THE COMPANY",
    "THIS COMPANY",
    "CORPORATE OFFICER",
    "DIRECTOR SERVICES",
    "NOMINEE",
    "DESIGNATED AGENT",
    "OR OFFICER OF",
    "OFFICER OF",
    "AND/OR",
];

/// Whole-string placeholders
pub(crate) const PLACEHOLDER_VALUES: &[&str] = &[
    "N/A", "NA", "NONE", "UNKNOWN", "VARIOUS", "MULTIPLE", "PENDING", "REGISTERED AGENT",
    "OFFICER", "MEMBER", "MANAGER", "DIRECTOR",
];

/// Leading words that mark a description rather than a name
pub(crate) const DESCRIPTION_STARTERS: &[&str] = &["THE", "A", "AN", "AS", "PER", "SEE", "FOR"];

/// Conjunctions that must not dangle at either end of a name
pub(crate) const CONJUNCTIONS: &[&str] = &["AND", "OR", "&"];

/// Franchise brands recognized during tagging
pub(crate) const FRANCHISE_BRANDS: &[&str] = &[
    "MCDONALDS",
    "BURGER KING",
    "WENDYS",
    "SUBWAY",
    "DUNKIN",
    "STARBUCKS",
    "TACO BELL",
    "KFC",
    "PIZZA HUT",
    "DOMINOS",
    "CHICK FIL A",
    "POPEYES",
    "SONIC",
    "ARBYS",
    "DAIRY QUEEN",
    "JIMMY JOHNS",
    "PANERA",
    "CHIPOTLE",
    "7 ELEVEN",
    "CIRCLE K",
    "HOLIDAY INN",
    "HAMPTON INN",
    "MARRIOTT",
    "HILTON",
    "BEST WESTERN",
    "SUPER 8",
    "DOLLAR GENERAL",
    "FAMILY DOLLAR",
    "AUTOZONE",
    "JIFFY LUBE",
    "H&R BLOCK",
    "RE/MAX",
    "KELLER WILLIAMS",
    "CENTURY 21",
    "COLDWELL BANKER",
];
