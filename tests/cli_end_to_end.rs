//! End-to-end exercise of the CLI binary against a tiny synthetic cohort:
//! one chromosome carries a full-length IBD1 segment between two samples,
//! the rest are empty, and the run is expected to classify the pair as
//! parent-offspring and write it to predictions.txt.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use assert_cmd::Command;
use flate2::write::GzEncoder;
use flate2::Compression;
use predicates::prelude::*;

const NUM_CHROMOSOMES: u8 = 22;

fn write_gz(path: &Path, lines: &[String]) {
    let file = File::create(path).unwrap();
    let mut enc = GzEncoder::new(file, Compression::default());
    for line in lines {
        writeln!(enc, "{line}").unwrap();
    }
    enc.finish().unwrap();
}

fn matcher_row(id1: &str, id2: &str, hap1: u8, hap2: u8, start: u32, end: u32) -> String {
    format!("22\t{id1}\t{id2}\t{hap1}\t{hap2}\tX\tX\tX\t{start}\t{end}")
}

#[test]
fn classifies_a_full_length_ibd1_pair_as_parent_offspring() {
    let dir = tempfile::tempdir().unwrap();

    let input_folder = dir.path().join("panels");
    let genetic_map_dir = dir.path().join("maps");
    let rapid_output_dir = dir.path().join("rapid");
    let output_dir = dir.path().join("out");
    std::fs::create_dir_all(&input_folder).unwrap();
    std::fs::create_dir_all(&genetic_map_dir).unwrap();
    std::fs::create_dir_all(&rapid_output_dir).unwrap();

    write_gz(
        &input_folder.join("panel_chr22.vcf.gz"),
        &[
            "##fileformat=VCFv4.2".to_string(),
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tA\tB".to_string(),
        ],
    );

    for chrom in 1..=NUM_CHROMOSOMES {
        let mut f = File::create(genetic_map_dir.join(format!("chr{chrom}.rMap"))).unwrap();
        if chrom == 1 {
            writeln!(f, "rs1\t0.0").unwrap();
            writeln!(f, "rs2\t1000.0").unwrap();
        } else {
            writeln!(f, "rs1\t0.0").unwrap();
            writeln!(f, "rs2\t0.0000001").unwrap();
        }

        let chrom_dir = rapid_output_dir.join(chrom.to_string());
        std::fs::create_dir_all(&chrom_dir).unwrap();
        let rows = if chrom == 1 {
            vec![matcher_row("A", "B", 0, 0, 0, 1)]
        } else {
            vec![]
        };
        write_gz(&chrom_dir.join("results.max.gz"), &rows);
    }

    let mut cmd = Command::cargo_bin("raffi").unwrap();
    cmd.arg("--input-folder")
        .arg(&input_folder)
        .arg("--vcf-prefix")
        .arg("panel_chr")
        .arg("--genetic-map-dir")
        .arg(&genetic_map_dir)
        .arg("--rapid-output-dir")
        .arg(&rapid_output_dir)
        .arg("--output-dir")
        .arg(&output_dir)
        .arg("--max-degree")
        .arg("3")
        .arg("--num-threads")
        .arg("1")
        .arg("--quiet");

    cmd.assert().success();

    let predictions = std::fs::read_to_string(output_dir.join("predictions.txt")).unwrap();
    assert!(predictions.starts_with("ID1\tID2\tKINSHIP\tIBD0\tIBD1\tIBD2\tTYPE\n"));

    let body = predictions.lines().nth(1).expect("one prediction row");
    let fields: Vec<&str> = body.split('\t').collect();
    assert_eq!(fields[0], "A");
    assert_eq!(fields[1], "B");
    assert_eq!(fields[6], "PO");

    assert!(!output_dir.join(".temporary").exists());
}

#[test]
fn rejects_an_out_of_range_max_degree_before_touching_disk() {
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::cargo_bin("raffi").unwrap();
    cmd.arg("--input-folder")
        .arg(dir.path())
        .arg("--vcf-prefix")
        .arg("panel_chr")
        .arg("--genetic-map-dir")
        .arg(dir.path())
        .arg("--rapid-output-dir")
        .arg(dir.path())
        .arg("--max-degree")
        .arg("9");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("max-degree"));
}
