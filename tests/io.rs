use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use flate2::Compression;
use flate2::write::GzEncoder;
use mrcope::error::MrError;
use mrcope::io::{parse_chromosome, read_association_table};
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = File::create(&path).expect("create file");
    file.write_all(content.as_bytes()).expect("write file");
    path
}

#[test]
fn synonyms_are_resolved_and_se_is_inferred() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_file(
        &dir,
        "exposure.csv",
        "rsid,chrom,pos,effect_allele,other_allele,beta,pval,eaf\n\
         rs1,chr1,1000,a,g,0.1,0.05,0.3\n\
         rs2,2,2000,C,T,-0.2,1e-10,0.4\n",
    );
    let records = read_association_table(&path, "exposure", &HashMap::new()).expect("read");
    assert_eq!(records.len(), 2);
    let first = &records[0];
    assert_eq!(first.snp, "rs1");
    assert_eq!(first.chr, Some(1));
    assert_eq!(first.bp, Some(1000));
    assert_eq!(first.effect_allele, "A");
    assert_eq!(first.other_allele, "G");
    // |0.1 / qnorm(0.025)|
    assert!((first.se - 0.1 / 1.959_963_984_540_054).abs() < 1e-6);
}

#[test]
fn whitespace_and_gzip_tables() {
    let dir = TempDir::new().expect("temp dir");
    let content = "SNP A1 A2 BETA SE PVALUE EAF\nrs1 A G 0.1 0.02 1e-7 0.3\nrs2 C T 0.2 0.02 NA 0.3\n";
    let plain = write_file(&dir, "outcome.txt", content);
    let records = read_association_table(&plain, "outcome", &HashMap::new()).expect("read");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].se, 0.02);

    let gz_path = dir.path().join("outcome.txt.gz");
    let mut encoder = GzEncoder::new(File::create(&gz_path).expect("create"), Compression::default());
    encoder.write_all(content.as_bytes()).expect("compress");
    encoder.finish().expect("finish gzip");
    let records = read_association_table(&gz_path, "outcome", &HashMap::new()).expect("read gz");
    assert_eq!(records.len(), 1);
}

#[test]
fn user_column_mapping_takes_priority() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_file(
        &dir,
        "exposure.tsv",
        "variant\tA1\tA2\tBETA\tSE\tPVALUE\tEAF\nrs7\tA\tG\t0.1\t0.02\t1e-8\t0.2\n",
    );
    let mut columns = HashMap::new();
    columns.insert("SNP".to_string(), "variant".to_string());
    let records = read_association_table(&path, "exposure", &columns).expect("read");
    assert_eq!(records[0].snp, "rs7");
}

#[test]
fn missing_required_columns_are_validation_errors() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_file(&dir, "bad.csv", "SNP,BETA,SE\nrs1,0.1,0.02\n");
    let err = read_association_table(&path, "exposure", &HashMap::new()).expect_err("missing");
    let mr = err.downcast_ref::<MrError>().expect("typed error");
    assert!(matches!(mr, MrError::InputValidation(_)));
    assert!(mr.to_string().contains("PVALUE"));
}

#[test]
fn frequencies_outside_the_unit_interval_are_removed() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_file(
        &dir,
        "exposure.csv",
        "SNP,A1,A2,BETA,SE,PVALUE,EAF\nrs1,A,G,0.1,0.02,1e-8,0.3\nrs2,A,G,0.1,0.02,1e-8,1.0\n",
    );
    let records = read_association_table(&path, "exposure", &HashMap::new()).expect("read");
    assert_eq!(records.len(), 1);
}

#[test]
fn chromosome_labels() {
    assert_eq!(parse_chromosome("chr7"), Some(7));
    assert_eq!(parse_chromosome("X"), Some(23));
    assert_eq!(parse_chromosome("22.0"), Some(22));
    assert_eq!(parse_chromosome("MT"), None);
}
