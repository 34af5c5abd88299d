//! Per-chromosome segment ingestion, IBD2 detection and IBD1 union
//! aggregation, run by a single worker thread across its assigned slice of
//! chromosomes.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::dumpable::DumpableFrontier;
use crate::error::{RaffiError, Result};
use crate::genetic_map::MapTable;
use crate::ordering::Ordering;
use crate::segment::{complement, hap_encoding, merge_four, union_length, HapEncoding, SiteSpan};

/// How many individuals (id1 boundaries) a worker advances through per
/// chromosome before yielding at the barrier.
pub const NUM_IDS_PER_CYCLE: u32 = 1000;

/// Running IBD1/IBD2 totals for one ordered pair `(id1, id2)` on one
/// chromosome-owning worker. `total_ibd1` holds the *union* IBD1 length
/// until the release pass subtracts `total_ibd2` from it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PairStats {
    pub total_ibd1: f64,
    pub total_ibd2: f64,
}

/// `id1_index -> id2_index -> PairStats`, owned by a single worker thread.
pub type PerWorkerMatrix = FxHashMap<u32, FxHashMap<u32, PairStats>>;

struct ParsedRow {
    id1: u32,
    id2: u32,
    hap_encoding: HapEncoding,
    site_start: u32,
    site_end: u32,
}

/// Parses one matcher-output row. Column numbers are 1-indexed: 2=id1,
/// 3=id2, 4=hap1, 5=hap2, 9=site_start, 10=site_end; all other columns are
/// ignored but must be present. A missing column or a malformed hap/site
/// number is fatal; an id1/id2 string with no entry in `ordering` is
/// tolerated and causes the row to be skipped.
fn parse_row(line: &str, ordering: &Ordering, path: &Path) -> Result<Option<ParsedRow>> {
    let trimmed = line.trim_end_matches(['\n', '\r']);
    let mut fields = trimmed.split('\t');

    let missing = |col: &str| RaffiError::parse(path, 0, format!("missing column: {col}"));
    let invalid = |col: &str| RaffiError::parse(path, 0, format!("invalid numeric column: {col}"));

    let _col1 = fields.next().ok_or_else(|| missing("1"))?;
    let id1_str = fields.next().ok_or_else(|| missing("id1"))?;
    let id2_str = fields.next().ok_or_else(|| missing("id2"))?;
    let hap1_str = fields.next().ok_or_else(|| missing("hap1"))?;
    let hap2_str = fields.next().ok_or_else(|| missing("hap2"))?;
    let _col6 = fields.next().ok_or_else(|| missing("6"))?;
    let _col7 = fields.next().ok_or_else(|| missing("7"))?;
    let _col8 = fields.next().ok_or_else(|| missing("8"))?;
    let start_str = fields.next().ok_or_else(|| missing("site_start"))?;
    let end_str = fields.next().ok_or_else(|| missing("site_end"))?;

    let hap1: u8 = hap1_str.parse().map_err(|_| invalid("hap1"))?;
    let hap2: u8 = hap2_str.parse().map_err(|_| invalid("hap2"))?;
    let site_start: u32 = start_str.parse().map_err(|_| invalid("site_start"))?;
    let site_end: u32 = end_str.parse().map_err(|_| invalid("site_end"))?;

    let Some(id1) = ordering.index_of(id1_str) else {
        return Ok(None);
    };
    let Some(id2) = ordering.index_of(id2_str) else {
        return Ok(None);
    };

    Ok(Some(ParsedRow {
        id1,
        id2,
        hap_encoding: hap_encoding(hap1, hap2),
        site_start,
        site_end,
    }))
}

/// One chromosome's streaming ingestion state, owned exclusively by one
/// worker thread for the lifetime of the run.
pub struct ChromStream {
    chrom: u8,
    path: PathBuf,
    reader: Box<dyn BufRead + Send>,
    prev_id1: Option<u32>,
    staging: FxHashMap<u32, [Vec<SiteSpan>; 4]>,
    done: bool,
}

impl ChromStream {
    pub fn new(chrom: u8, path: PathBuf, reader: Box<dyn BufRead + Send>) -> Self {
        ChromStream {
            chrom,
            path,
            reader,
            prev_id1: None,
            staging: FxHashMap::default(),
            done: false,
        }
    }

    pub fn chrom(&self) -> u8 {
        self.chrom
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn finalize(&mut self, id1: u32, map: &MapTable, matrix: &mut PerWorkerMatrix) {
        for (&id2, lists) in self.staging.iter() {
            let merged = merge_four(lists);
            if merged.is_empty() {
                continue;
            }
            let union = union_length(&merged, self.chrom, map);
            matrix
                .entry(id1)
                .or_default()
                .entry(id2)
                .or_default()
                .total_ibd1 += union;
        }
    }

    /// Processes one row against the current staging buffer. Returns
    /// `true` when this row belongs to a new id1 (i.e. a previous
    /// individual's staging buffer was just finalized and cleared).
    fn process_row(
        &mut self,
        row: &ParsedRow,
        map: &MapTable,
        matrix: &mut PerWorkerMatrix,
    ) -> bool {
        let is_new_individual = self.prev_id1 != Some(row.id1);

        if is_new_individual {
            if let Some(prev) = self.prev_id1 {
                self.finalize(prev, map, matrix);
            }
            self.staging.clear();
            self.prev_id1 = Some(row.id1);
        } else if let Some(spans) = self.staging.get(&row.id2) {
            let comp = complement(row.hap_encoding);
            let mut overlap = 0.0;
            for &(s, e) in &spans[comp as usize] {
                let lo = s.max(row.site_start);
                let hi = e.min(row.site_end);
                if lo <= hi {
                    overlap += map.genetic_length(self.chrom, lo, hi);
                }
            }
            if overlap > 0.0 {
                matrix
                    .entry(row.id1)
                    .or_default()
                    .entry(row.id2)
                    .or_default()
                    .total_ibd2 += overlap;
            }
        }

        self.staging
            .entry(row.id2)
            .or_insert_with(|| [Vec::new(), Vec::new(), Vec::new(), Vec::new()])[
            row.hap_encoding as usize
        ]
        .push((row.site_start, row.site_end));

        is_new_individual
    }

    /// Runs up to one cycle: either `NUM_IDS_PER_CYCLE` completed
    /// individual boundaries, or exhausting the stream, whichever comes
    /// first. A no-op if this stream already reached end of file.
    pub fn run_cycle(
        &mut self,
        map: &MapTable,
        matrix: &mut PerWorkerMatrix,
        dumpable: &DumpableFrontier,
        ordering: &Ordering,
    ) -> Result<()> {
        if self.done {
            return Ok(());
        }

        // The very first transition out of "no individual yet" does not
        // correspond to a finished individual, so it must not count toward
        // the cycle's boundary budget.
        let mut boundaries: i64 = if self.prev_id1.is_none() { -1 } else { 0 };
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = self
                .reader
                .read_line(&mut line)
                .map_err(|e| RaffiError::io(&self.path, e))?;

            if bytes_read == 0 {
                if let Some(prev) = self.prev_id1.take() {
                    self.finalize(prev, map, matrix);
                }
                self.staging.clear();
                self.done = true;
                dumpable.update(self.chrom, ordering.last_index() as i64);
                return Ok(());
            }

            let Some(row) = parse_row(&line, ordering, &self.path)? else {
                continue;
            };
            if row.id1 == row.id2 {
                continue;
            }

            let is_new = self.process_row(&row, map, matrix);
            if is_new {
                boundaries += 1;
                if boundaries == NUM_IDS_PER_CYCLE as i64 {
                    dumpable.update(self.chrom, row.id1 as i64 - 1);
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::{BufReader, Cursor, Write};

    fn identity_map(dir: &Path, chrom: u8, sites: u32) -> MapTable {
        let mut f = File::create(dir.join(format!("chr{chrom}.rMap"))).unwrap();
        for site in 0..sites {
            writeln!(f, "rs{site}\t{}", site as f64).unwrap();
        }
        MapTable::load(dir, chrom).unwrap()
    }

    fn row(id1: &str, id2: &str, hap1: u8, hap2: u8, start: u32, end: u32) -> String {
        format!("22\t{id1}\t{id2}\t{hap1}\t{hap2}\tX\tX\tX\t{start}\t{end}\n")
    }

    fn test_ordering(ids: &[&str]) -> Ordering {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chr22.vcf.gz");
        let file = File::create(&path).unwrap();
        let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut header = String::from("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT");
        for id in ids {
            header.push('\t');
            header.push_str(id);
        }
        writeln!(enc, "{header}").unwrap();
        enc.finish().unwrap();
        Ordering::from_vcf_gz(&path).unwrap()
    }

    #[test]
    fn ibd2_detected_from_complementary_hap_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let map = identity_map(dir.path(), 1, 1000);
        let ordering = test_ordering(&["A", "B"]);

        let mut data = String::new();
        // hap_encoding(0,0)=0, complement=3; hap_encoding(1,1)=3.
        data.push_str(&row("A", "B", 0, 0, 10, 50));
        data.push_str(&row("A", "B", 1, 1, 20, 60));

        let reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(Cursor::new(data)));
        let mut stream = ChromStream::new(1, dir.path().join("chr1.results"), reader);
        let mut matrix = PerWorkerMatrix::default();
        let dumpable = DumpableFrontier::new(1);

        stream.run_cycle(&map, &mut matrix, &dumpable, &ordering).unwrap();

        let id_a = ordering.index_of("A").unwrap();
        let id_b = ordering.index_of("B").unwrap();
        let stats = matrix[&id_a][&id_b];
        assert_eq!(stats.total_ibd2, 30.0); // overlap [20,50]
    }

    #[test]
    fn ibd1_union_merges_across_hap_pairs_on_new_individual() {
        let dir = tempfile::tempdir().unwrap();
        let map = identity_map(dir.path(), 1, 1000);
        let ordering = test_ordering(&["A", "B", "C"]);

        let mut data = String::new();
        data.push_str(&row("A", "B", 0, 0, 0, 10));
        data.push_str(&row("A", "B", 0, 1, 5, 20));
        // new id1 -> finalizes A's staging buffer
        data.push_str(&row("C", "B", 0, 0, 0, 5));

        let reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(Cursor::new(data)));
        let mut stream = ChromStream::new(1, dir.path().join("chr1.results"), reader);
        let mut matrix = PerWorkerMatrix::default();
        let dumpable = DumpableFrontier::new(1);

        stream.run_cycle(&map, &mut matrix, &dumpable, &ordering).unwrap();

        let id_a = ordering.index_of("A").unwrap();
        let id_b = ordering.index_of("B").unwrap();
        let stats = matrix[&id_a][&id_b];
        assert_eq!(stats.total_ibd1, 20.0); // union of [0,10] and [5,20]
    }

    #[test]
    fn eof_finalizes_the_last_pending_individual() {
        let dir = tempfile::tempdir().unwrap();
        let map = identity_map(dir.path(), 1, 1000);
        let ordering = test_ordering(&["A", "B"]);

        let data = row("A", "B", 0, 0, 0, 10);
        let reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(Cursor::new(data)));
        let mut stream = ChromStream::new(1, dir.path().join("chr1.results"), reader);
        let mut matrix = PerWorkerMatrix::default();
        let dumpable = DumpableFrontier::new(1);

        stream.run_cycle(&map, &mut matrix, &dumpable, &ordering).unwrap();

        assert!(stream.is_done());
        let id_a = ordering.index_of("A").unwrap();
        let id_b = ordering.index_of("B").unwrap();
        assert_eq!(matrix[&id_a][&id_b].total_ibd1, 10.0);
        assert_eq!(dumpable.min_dumpable(), ordering.last_index() as i64);
    }

    #[test]
    fn unknown_sample_id_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let map = identity_map(dir.path(), 1, 1000);
        let ordering = test_ordering(&["A", "B"]);

        let mut data = String::new();
        data.push_str(&row("ghost", "B", 0, 0, 0, 10));
        data.push_str(&row("A", "B", 0, 0, 0, 10));

        let reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(Cursor::new(data)));
        let mut stream = ChromStream::new(1, dir.path().join("chr1.results"), reader);
        let mut matrix = PerWorkerMatrix::default();
        let dumpable = DumpableFrontier::new(1);

        stream.run_cycle(&map, &mut matrix, &dumpable, &ordering).unwrap();
        assert!(stream.is_done());
    }

    #[test]
    fn malformed_numeric_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let map = identity_map(dir.path(), 1, 1000);
        let ordering = test_ordering(&["A", "B"]);

        let data = "22\tA\tB\tnot-a-number\t0\tX\tX\tX\t0\t10\n".to_string();
        let reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(Cursor::new(data)));
        let mut stream = ChromStream::new(1, dir.path().join("chr1.results"), reader);
        let mut matrix = PerWorkerMatrix::default();
        let dumpable = DumpableFrontier::new(1);

        let result = stream.run_cycle(&map, &mut matrix, &dumpable, &ordering);
        assert!(result.is_err());
    }
}
