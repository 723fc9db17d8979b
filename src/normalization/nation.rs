use std::collections::HashMap;

/// IOC-style three-letter nation codes as the game client reports them,
/// paired with the full country name the target schema stores. The legacy
/// store keeps only the code. `OTH` is the client's catch-all.
const NATIONS: &[(&str, &str)] = &[
    ("AFG", "Afghanistan"),
    ("ALB", "Albania"),
    ("ALG", "Algeria"),
    ("AND", "Andorra"),
    ("ANG", "Angola"),
    ("ANT", "Antigua and Barbuda"),
    ("ARG", "Argentina"),
    ("ARM", "Armenia"),
    ("ARU", "Aruba"),
    ("ASA", "American Samoa"),
    ("AUS", "Australia"),
    ("AUT", "Austria"),
    ("AZE", "Azerbaijan"),
    ("BAH", "Bahamas"),
    ("BAN", "Bangladesh"),
    ("BAR", "Barbados"),
    ("BDI", "Burundi"),
    ("BEL", "Belgium"),
    ("BEN", "Benin"),
    ("BER", "Bermuda"),
    ("BHU", "Bhutan"),
    ("BIH", "Bosnia and Herzegovina"),
    ("BIZ", "Belize"),
    ("BLR", "Belarus"),
    ("BOL", "Bolivia"),
    ("BOT", "Botswana"),
    ("BRA", "Brazil"),
    ("BRN", "Bahrain"),
    ("BRU", "Brunei"),
    ("BUL", "Bulgaria"),
    ("BUR", "Burkina Faso"),
    ("CAF", "Central African Republic"),
    ("CAM", "Cambodia"),
    ("CAN", "Canada"),
    ("CAY", "Cayman Islands"),
    ("CGO", "Congo"),
    ("CHA", "Chad"),
    ("CHI", "Chile"),
    ("CHN", "China"),
    ("CIV", "Ivory Coast"),
    ("CMR", "Cameroon"),
    ("COD", "DR Congo"),
    ("COK", "Cook Islands"),
    ("COL", "Colombia"),
    ("COM", "Comoros"),
    ("CPV", "Cape Verde"),
    ("CRC", "Costa Rica"),
    ("CRO", "Croatia"),
    ("CUB", "Cuba"),
    ("CYP", "Cyprus"),
    ("CZE", "Czech Republic"),
    ("DEN", "Denmark"),
    ("DJI", "Djibouti"),
    ("DMA", "Dominica"),
    ("DOM", "Dominican Republic"),
    ("ECU", "Ecuador"),
    ("EGY", "Egypt"),
    ("ERI", "Eritrea"),
    ("ESA", "El Salvador"),
    ("ESP", "Spain"),
    ("EST", "Estonia"),
    ("ETH", "Ethiopia"),
    ("FIJ", "Fiji"),
    ("FIN", "Finland"),
    ("FRA", "France"),
    ("FSM", "Micronesia"),
    ("GAB", "Gabon"),
    ("GAM", "Gambia"),
    ("GBR", "United Kingdom"),
    ("GBS", "Guinea-Bissau"),
    ("GEO", "Georgia"),
    ("GEQ", "Equatorial Guinea"),
    ("GER", "Germany"),
    ("GHA", "Ghana"),
    ("GRE", "Greece"),
    ("GRN", "Grenada"),
    ("GUA", "Guatemala"),
    ("GUI", "Guinea"),
    ("GUM", "Guam"),
    ("GUY", "Guyana"),
    ("HAI", "Haiti"),
    ("HKG", "Hong Kong"),
    ("HON", "Honduras"),
    ("HUN", "Hungary"),
    ("INA", "Indonesia"),
    ("IND", "India"),
    ("IRI", "Iran"),
    ("IRL", "Ireland"),
    ("IRQ", "Iraq"),
    ("ISL", "Iceland"),
    ("ISR", "Israel"),
    ("ISV", "Virgin Islands"),
    ("ITA", "Italy"),
    ("IVB", "British Virgin Islands"),
    ("JAM", "Jamaica"),
    ("JOR", "Jordan"),
    ("JPN", "Japan"),
    ("KAZ", "Kazakhstan"),
    ("KEN", "Kenya"),
    ("KGZ", "Kyrgyzstan"),
    ("KIR", "Kiribati"),
    ("KOR", "South Korea"),
    ("KOS", "Kosovo"),
    ("KSA", "Saudi Arabia"),
    ("KUW", "Kuwait"),
    ("LAO", "Laos"),
    ("LAT", "Latvia"),
    ("LBA", "Libya"),
    ("LBR", "Liberia"),
    ("LCA", "Saint Lucia"),
    ("LES", "Lesotho"),
    ("LIB", "Lebanon"),
    ("LIE", "Liechtenstein"),
    ("LTU", "Lithuania"),
    ("LUX", "Luxembourg"),
    ("MAD", "Madagascar"),
    ("MAR", "Morocco"),
    ("MAS", "Malaysia"),
    ("MAW", "Malawi"),
    ("MDA", "Moldova"),
    ("MDV", "Maldives"),
    ("MEX", "Mexico"),
    ("MGL", "Mongolia"),
    ("MHL", "Marshall Islands"),
    ("MKD", "North Macedonia"),
    ("MLI", "Mali"),
    ("MLT", "Malta"),
    ("MNE", "Montenegro"),
    ("MON", "Monaco"),
    ("MOZ", "Mozambique"),
    ("MRI", "Mauritius"),
    ("MTN", "Mauritania"),
    ("MYA", "Myanmar"),
    ("NAM", "Namibia"),
    ("NCA", "Nicaragua"),
    ("NED", "Netherlands"),
    ("NEP", "Nepal"),
    ("NGR", "Nigeria"),
    ("NIG", "Niger"),
    ("NOR", "Norway"),
    ("NRU", "Nauru"),
    ("NZL", "New Zealand"),
    ("OMA", "Oman"),
    ("OTH", "Other"),
    ("PAK", "Pakistan"),
    ("PAN", "Panama"),
    ("PAR", "Paraguay"),
    ("PER", "Peru"),
    ("PHI", "Philippines"),
    ("PLE", "Palestine"),
    ("PLW", "Palau"),
    ("PNG", "Papua New Guinea"),
    ("POL", "Poland"),
    ("POR", "Portugal"),
    ("PRK", "North Korea"),
    ("PUR", "Puerto Rico"),
    ("QAT", "Qatar"),
    ("ROM", "Romania"),
    ("ROU", "Romania"),
    ("RSA", "South Africa"),
    ("RUS", "Russia"),
    ("RWA", "Rwanda"),
    ("SAM", "Samoa"),
    ("SEN", "Senegal"),
    ("SEY", "Seychelles"),
    ("SGP", "Singapore"),
    ("SIN", "Singapore"),
    ("SKN", "Saint Kitts and Nevis"),
    ("SLE", "Sierra Leone"),
    ("SLO", "Slovenia"),
    ("SMR", "San Marino"),
    ("SOL", "Solomon Islands"),
    ("SOM", "Somalia"),
    ("SRB", "Serbia"),
    ("SRI", "Sri Lanka"),
    ("STP", "Sao Tome and Principe"),
    ("SUD", "Sudan"),
    ("SUI", "Switzerland"),
    ("SUR", "Suriname"),
    ("SVK", "Slovakia"),
    ("SWE", "Sweden"),
    ("SWZ", "Eswatini"),
    ("SYR", "Syria"),
    ("TAN", "Tanzania"),
    ("TGA", "Tonga"),
    ("THA", "Thailand"),
    ("TJK", "Tajikistan"),
    ("TKM", "Turkmenistan"),
    ("TLS", "East Timor"),
    ("TOG", "Togo"),
    ("TPE", "Taiwan"),
    ("TRI", "Trinidad and Tobago"),
    ("TUN", "Tunisia"),
    ("TUR", "Turkey"),
    ("TUV", "Tuvalu"),
    ("UAE", "United Arab Emirates"),
    ("UGA", "Uganda"),
    ("UKR", "Ukraine"),
    ("URU", "Uruguay"),
    ("USA", "United States"),
    ("UZB", "Uzbekistan"),
    ("VAN", "Vanuatu"),
    ("VEN", "Venezuela"),
    ("VIE", "Vietnam"),
    ("VIN", "Saint Vincent and the Grenadines"),
    ("YEM", "Yemen"),
    ("ZAM", "Zambia"),
    ("ZIM", "Zimbabwe"),
];

/// O(1) nation-code lookup built from the static table.
#[derive(Debug, Clone)]
pub struct NationIndex {
    by_code: HashMap<&'static str, &'static str>,
}

impl NationIndex {
    pub fn with_defaults() -> Self {
        Self {
            by_code: NATIONS.iter().copied().collect(),
        }
    }

    /// Full country name for a code, or None when the code is unknown.
    pub fn region_name(&self, code: &str) -> Option<&'static str> {
        self.by_code.get(code.trim()).copied()
    }
}

impl Default for NationIndex {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_common_codes() {
        let index = NationIndex::with_defaults();
        assert_eq!(index.region_name("FRA"), Some("France"));
        assert_eq!(index.region_name("GER"), Some("Germany"));
        assert_eq!(index.region_name("SUI"), Some("Switzerland"));
        assert_eq!(index.region_name("OTH"), Some("Other"));
    }

    #[test]
    fn resolves_old_and_new_variants() {
        let index = NationIndex::with_defaults();
        assert_eq!(index.region_name("ROM"), index.region_name("ROU"));
        assert_eq!(index.region_name("SIN"), index.region_name("SGP"));
    }

    #[test]
    fn unknown_codes_return_none() {
        let index = NationIndex::with_defaults();
        assert_eq!(index.region_name("XXX"), None);
        assert_eq!(index.region_name(""), None);
    }

    #[test]
    fn tolerates_padded_codes() {
        let index = NationIndex::with_defaults();
        assert_eq!(index.region_name(" POL "), Some("Poland"));
    }
}
