//! Counter table parsing
//!
//! The load balancer exposes its counters as one delimited text
//! table: a header line prefixed with a comment marker, then one
//! line per service entity. A missing or non-numeric value yields 0
//! for that field rather than dropping the row.

use std::collections::HashMap;

use crate::error::TelemetryError;
use crate::models::CounterRow;

/// Parse a raw counter table into rows, preserving input order.
///
/// Fails with [`TelemetryError::Parse`] only when no usable header
/// is present; every data line that names a service is kept.
pub fn parse_counter_table(text: &str) -> Result<Vec<CounterRow>, TelemetryError> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let header = lines
        .next()
        .ok_or_else(|| TelemetryError::Parse("counter table is empty".to_string()))?;
    let header = header.trim_start().trim_start_matches('#').trim_start();

    let mut columns: HashMap<&str, usize> = HashMap::new();
    for (index, name) in header.split(',').enumerate() {
        let name = name.trim();
        if !name.is_empty() {
            // Duplicate column names keep the first position.
            columns.entry(name).or_insert(index);
        }
    }

    if !columns.contains_key("pxname") || !columns.contains_key("svname") {
        return Err(TelemetryError::Parse(format!(
            "header does not name pxname/svname columns: {:?}",
            header.split(',').take(4).collect::<Vec<_>>()
        )));
    }

    let mut rows = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split(',').collect();
        let reader = FieldReader {
            columns: &columns,
            fields: &fields,
        };

        let service_name = reader.text("pxname");
        if service_name.is_empty() {
            continue;
        }

        rows.push(CounterRow {
            service_name,
            entity_name: reader.text("svname"),
            status: reader.text("status"),
            scur: reader.num("scur"),
            smax: reader.num("smax"),
            stot: reader.num("stot"),
            bin: reader.num("bin"),
            bout: reader.num("bout"),
            ereq: reader.num("ereq"),
            econ: reader.num("econ"),
            eresp: reader.num("eresp"),
            wretr: reader.num("wretr"),
            wredis: reader.num("wredis"),
            weight: reader.num("weight"),
            act: reader.num("act"),
            bck: reader.num("bck"),
            chkfail: reader.num("chkfail"),
            chkdown: reader.num("chkdown"),
            downtime: reader.num("downtime"),
            rate: reader.num("rate"),
            rate_max: reader.num("rate_max"),
            hrsp_2xx: reader.num("hrsp_2xx"),
            hrsp_3xx: reader.num("hrsp_3xx"),
            hrsp_4xx: reader.num("hrsp_4xx"),
            hrsp_5xx: reader.num("hrsp_5xx"),
            cli_abrt: reader.num("cli_abrt"),
            srv_abrt: reader.num("srv_abrt"),
            lastsess: reader.num_signed("lastsess"),
            qtime: reader.num("qtime"),
            ctime: reader.num("ctime"),
            rtime: reader.num("rtime"),
            ttime: reader.num("ttime"),
            check_status: reader.text("check_status"),
            check_code: reader.num("check_code"),
            check_duration: reader.num("check_duration"),
            last_chk: reader.text("last_chk"),
            qtime_max: reader.num("qtime_max"),
            ctime_max: reader.num("ctime_max"),
            rtime_max: reader.num("rtime_max"),
            ttime_max: reader.num("ttime_max"),
        });
    }

    Ok(rows)
}

/// Looks up one data line's fields by header column name.
struct FieldReader<'a> {
    columns: &'a HashMap<&'a str, usize>,
    fields: &'a [&'a str],
}

impl FieldReader<'_> {
    fn raw(&self, name: &str) -> &str {
        self.columns
            .get(name)
            .and_then(|&index| self.fields.get(index))
            .map(|field| field.trim())
            .unwrap_or("")
    }

    fn text(&self, name: &str) -> String {
        self.raw(name).to_string()
    }

    fn num(&self, name: &str) -> u64 {
        self.raw(name).parse().unwrap_or(0)
    }

    fn num_signed(&self, name: &str) -> i64 {
        self.raw(name).parse().unwrap_or(0)
    }
}
