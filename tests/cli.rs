use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const BINARY: &str = "umicollapse";
type TestResult = Result<(), Box<dyn std::error::Error>>;

const READ1: &str = "\
@r1/1
ACGTCAGGGG
+
IIIIIIIIII
@r2/1
ACGTCAGGGC
+
IIIIIIIII5
@r3/1
TTTTCAAAAA
+
IIIIIIIIII
";

const READ2: &str = "\
@r1/2
CCCC
+
IIII
@r2/2
CCCC
+
IIII
@r3/2
GGGG
+
IIII
";

const SORTED_BED: &str = "\
chr1\t10000\t20000\tACT_1\t0\t+
chr1\t10000\t20000\tACT_1\t0\t+
chr1\t10000\t20000\tACG_1\t0\t+
chr1\t10000\t20000\tACT_1\t0\t-
chr2\t500\t700\tGGA_1\t0\t+
";

fn cluster_command(dir: &assert_fs::TempDir) -> Result<Command, Box<dyn std::error::Error>> {
    let r1 = dir.child("in_R1.fastq");
    r1.write_str(READ1)?;
    let r2 = dir.child("in_R2.fastq");
    r2.write_str(READ2)?;

    let mut cmd = Command::cargo_bin(BINARY)?;
    cmd.args(["cluster", "-1"])
        .arg(r1.path())
        .arg("-2")
        .arg(r2.path())
        .args(["-x", "4", "-c", "CA", "-a", "0", "-q", "0", "-r", "read1", "-f", "0.5", "-t", "2"]);
    Ok(cmd)
}

#[test]
fn file_doesnt_exist() -> TestResult {
    let mut cmd = Command::cargo_bin(BINARY)?;

    cmd.args(["dedup", "-i", "file_which_does_not_exist.bed"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unable to open file"));

    Ok(())
}

#[test]
fn cluster_calls_one_consensus_per_barcode() -> TestResult {
    let dir = assert_fs::TempDir::new()?;
    let prefix = dir.child("out");
    let stats = dir.child("stats.json");

    cluster_command(&dir)?
        .arg("-o")
        .arg(prefix.path())
        .arg("--stats")
        .arg(stats.path())
        .assert()
        .success();

    let r1 = std::fs::read_to_string(dir.child("out_R1_001.fastq").path())?;
    let r2 = std::fs::read_to_string(dir.child("out_R2_001.fastq").path())?;
    assert_eq!(r1, "@r1_ACGT_2\nGGGG\n+\nIIII\n@r3_TTTT_1\nAAAA\n+\nIIII\n");
    assert_eq!(r2, "@r1_ACGT_2\nCCCC\n+\nIIII\n@r3_TTTT_1\nGGGG\n+\nIIII\n");

    let stats: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(stats.path())?)?;
    assert_eq!(stats["command"], "cluster");
    assert_eq!(stats["stats"]["read_pairs"], 3);
    assert_eq!(stats["stats"]["emitted_clusters"], 2);

    Ok(())
}

#[test]
fn cluster_buckets_by_barcode_prefix() -> TestResult {
    let dir = assert_fs::TempDir::new()?;
    let prefix = dir.child("out");

    cluster_command(&dir)?
        .arg("-o")
        .arg(prefix.path())
        .args(["--prefix-len", "1", "--interleaved"])
        .assert()
        .success();

    let a = std::fs::read_to_string(dir.child("out_A.fastq").path())?;
    assert_eq!(a, "@r1_ACGT_2\nGGGG\n+\nIIII\n@r1_ACGT_2\nCCCC\n+\nIIII\n");
    dir.child("out_T.fastq").assert(predicate::path::exists());

    Ok(())
}

#[test]
fn cluster_minimum_members() -> TestResult {
    let dir = assert_fs::TempDir::new()?;
    let prefix = dir.child("out");

    cluster_command(&dir)?
        .arg("-o")
        .arg(prefix.path())
        .args(["--min-members", "2"])
        .assert()
        .success();

    let r1 = std::fs::read_to_string(dir.child("out_R1_001.fastq").path())?;
    assert_eq!(r1, "@r1_ACGT_2\nGGGG\n+\nIIII\n");

    Ok(())
}

#[test]
fn cluster_accepts_empty_input() -> TestResult {
    let dir = assert_fs::TempDir::new()?;
    let r1 = dir.child("in_R1.fastq");
    r1.touch()?;
    let r2 = dir.child("in_R2.fastq");
    r2.touch()?;
    let stats = dir.child("stats.json");

    Command::cargo_bin(BINARY)?
        .args(["cluster", "-1"])
        .arg(r1.path())
        .arg("-2")
        .arg(r2.path())
        .arg("-o")
        .arg(dir.child("out").path())
        .arg("--stats")
        .arg(stats.path())
        .args(["-x", "4", "-c", "CA", "-r", "read1"])
        .assert()
        .success();

    dir.child("out_R1_001.fastq").assert("");
    dir.child("out_R2_001.fastq").assert("");
    let stats: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(stats.path())?)?;
    assert_eq!(stats["stats"]["read_pairs"], 0);
    assert_eq!(stats["stats"]["emitted_clusters"], 0);

    Ok(())
}

#[test]
fn cluster_rejects_desynchronised_reads() -> TestResult {
    let dir = assert_fs::TempDir::new()?;
    let r1 = dir.child("in_R1.fastq");
    r1.write_str(READ1)?;
    let r2 = dir.child("in_R2.fastq");
    r2.write_str("@r1/2\nCCCC\n+\nIIII\n")?;

    Command::cargo_bin(BINARY)?
        .args(["cluster", "-1"])
        .arg(r1.path())
        .arg("-2")
        .arg(r2.path())
        .arg("-o")
        .arg(dir.child("out").path())
        .args(["-x", "4", "-c", "CA", "-r", "read1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not synchronised"));

    Ok(())
}

#[test]
fn cluster_rejects_empty_barcode() -> TestResult {
    Command::cargo_bin(BINARY)?
        .args([
            "cluster", "-1", "a.fastq", "-2", "b.fastq", "-o", "out", "-x", "0", "-r", "read1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("barcode-len"));

    Ok(())
}

#[test]
fn dedup_exact_and_tolerant() -> TestResult {
    assert_cmd::Command::cargo_bin(BINARY)?
        .args(["dedup", "-i", "-"])
        .write_stdin(SORTED_BED)
        .assert()
        .success()
        .stdout(
            "chr1\t10000\t20000\tACT_2_members\t10000\t+\n\
             chr1\t10000\t20000\tACG_1_members\t10000\t+\n\
             chr1\t10000\t20000\tACT_1_members\t10000\t-\n\
             chr2\t500\t700\tGGA_1_members\t200\t+\n",
        );

    assert_cmd::Command::cargo_bin(BINARY)?
        .args(["dedup", "-i", "-", "-m", "1"])
        .write_stdin(SORTED_BED)
        .assert()
        .success()
        .stdout(
            "chr1\t10000\t20000\tACT_3_members\t10000\t+\n\
             chr1\t10000\t20000\tACT_1_members\t10000\t-\n\
             chr2\t500\t700\tGGA_1_members\t200\t+\n",
        );

    Ok(())
}

#[test]
fn dedup_unsorted_input_leaves_no_output() -> TestResult {
    let dir = assert_fs::TempDir::new()?;
    let input = dir.child("in.bed");
    input.write_str("chr1\t500\t600\tACT\t0\t+\nchr1\t100\t200\tACT\t0\t+\n")?;
    let output = dir.child("out.bed");

    Command::cargo_bin(BINARY)?
        .args(["dedup", "-i"])
        .arg(input.path())
        .arg("-o")
        .arg(output.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not coordinate sorted"));

    output.assert(predicate::path::missing());

    Ok(())
}

#[test]
fn dedup_rejects_inverted_length_window() -> TestResult {
    assert_cmd::Command::cargo_bin(BINARY)?
        .args(["dedup", "-i", "-", "--len", "500,10"])
        .write_stdin(SORTED_BED)
        .assert()
        .failure()
        .stderr(predicate::str::contains("`len`"));

    Ok(())
}

#[test]
fn saturation_estimates() -> TestResult {
    Command::cargo_bin(BINARY)?
        .args([
            "saturation", "--draws", "53", "--distinct", "52", "--umi-len", "3", "--model", "poisson",
        ])
        .assert()
        .success()
        .stdout("107\n");

    Command::cargo_bin(BINARY)?
        .args([
            "saturation", "--draws", "53", "--distinct", "52", "--umi-len", "5", "--rounding", "nearest",
        ])
        .assert()
        .success()
        .stdout("53\n");

    Ok(())
}

#[test]
fn saturation_rejects_unrepresentable_barcode_space() -> TestResult {
    Command::cargo_bin(BINARY)?
        .args(["saturation", "--draws", "10", "--distinct", "5", "--umi-len", "600"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("too large to represent"));

    Ok(())
}

#[test]
fn saturation_overflow_is_reported() -> TestResult {
    Command::cargo_bin(BINARY)?
        .args(["saturation", "--draws", "100", "--distinct", "64", "--umi-len", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("saturation overflow"));

    Ok(())
}
