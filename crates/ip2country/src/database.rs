//! In-memory IP range table backed by a CSV country database.
//!
//! Two headerless row layouts are accepted:
//!
//! - `start_ip,end_ip,country` (the common "lite" layout).
//! - `start_ip,end_ip,start_num,end_num,country,name` (the legacy GeoIP
//!   country CSV).
//!
//! Fields may be quoted and lines starting with `#` are ignored. IPv4 and IPv6
//! ranges can be mixed in the same file; IPv4 addresses are stored as
//! IPv4-mapped IPv6 so that both families live in one sorted table.

use crate::{
    error::{DatabaseError, Error, Result},
    lookup::CountryLookup,
};
use std::{
    fs::File,
    io,
    net::{IpAddr, Ipv6Addr},
    path::Path,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct IpRange {
    start: u128,
    end: u128,
    country: Box<str>,
}

/// Sorted, non-overlapping address ranges mapped to country codes.
#[derive(Debug, Default, Clone)]
pub struct RangeTable {
    ranges: Vec<IpRange>,
}

impl RangeTable {
    /// Loads a range table from the CSV file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`] if the file cannot be opened or any row is
    /// invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let database_error = |source| Error::Database {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(|e| database_error(DatabaseError::Io(e)))?;
        let table = Self::from_reader(io::BufReader::new(file)).map_err(database_error)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Loaded {} ranges from {}", table.len(), path.display());

        Ok(table)
    }

    /// Parses a range table from CSV rows.
    ///
    /// # Errors
    ///
    /// Fails on unreadable input, rows with an unsupported column count,
    /// unparsable addresses, inverted ranges, and overlapping ranges.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, DatabaseError> {
        let mut rows = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut ranges = Vec::new();
        for row in rows.records() {
            let row = row?;
            let range = parse_row(&row).map_err(|reason| DatabaseError::InvalidRow {
                line: row.position().map_or(0, csv::Position::line),
                reason,
            })?;
            ranges.push(range);
        }

        ranges.sort_unstable_by_key(|range| range.start);
        if let Some(pair) = ranges.windows(2).find(|pair| pair[0].end >= pair[1].start) {
            return Err(DatabaseError::Overlap {
                first: describe(&pair[0]),
                second: describe(&pair[1]),
            });
        }

        Ok(Self { ranges })
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Returns the country code of the range containing `ip`, if any.
    pub fn lookup(&self, ip: IpAddr) -> Option<&str> {
        let key = to_key(ip);
        let idx = self.ranges.partition_point(|range| range.start <= key);
        let range = self.ranges.get(idx.checked_sub(1)?)?;
        (key <= range.end && !range.country.is_empty()).then_some(&*range.country)
    }
}

impl CountryLookup for RangeTable {
    fn country(&self, key: &str) -> Option<&str> {
        key.parse::<IpAddr>().ok().and_then(|ip| self.lookup(ip))
    }
}

fn parse_row(row: &csv::StringRecord) -> Result<IpRange, String> {
    let country_col = match row.len() {
        3 => 2,
        6 => 4,
        n => return Err(format!("expected 3 or 6 columns, found {n}")),
    };

    let start = parse_ip(&row[0])?;
    let end = parse_ip(&row[1])?;
    if start > end {
        return Err(format!("range start {} is after end {}", &row[0], &row[1]));
    }

    Ok(IpRange {
        start,
        end,
        country: row[country_col].into(),
    })
}

fn parse_ip(field: &str) -> Result<u128, String> {
    field
        .parse::<IpAddr>()
        .map(to_key)
        .map_err(|_| format!("invalid IP address {field:?}"))
}

fn to_key(ip: IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u128::from(v4.to_ipv6_mapped()),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

fn from_key(key: u128) -> IpAddr {
    let v6 = Ipv6Addr::from(key);
    v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4)
}

fn describe(range: &IpRange) -> String {
    format!("{}-{}", from_key(range.start), from_key(range.end))
}
