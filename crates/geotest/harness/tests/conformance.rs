//! Checker protocols against the JRAS driver.

mod common;

use common::*;
use geotest_driver::{Access, DataType, Statistics, Window};
use geotest_harness::{
    CreateCopyOptions, CreateOptions, HarnessConfig, OpenChecks, TestOutcome, TestSpec,
};
use geotest_jras::driver::OPTION_REFUSE;
use geotest_jras::RasterDocument;

fn expect_fail(outcome: TestOutcome, reason: &str) {
    assert_eq!(outcome, TestOutcome::fail(reason));
}

// ── test_open ───────────────────────────────────────────────────────

#[test]
fn open_matches_recorded_values() {
    let fx = Fixture::new();
    let checks = OpenChecks {
        projection: Some("EPSG:26711".to_string()),
        geotransform: Some(SAMPLE_GEOTRANSFORM),
        statistics: Some(Statistics::from(SAMPLE_STATISTICS)),
        approx_statistics: Some(Statistics::from(SAMPLE_STATISTICS)),
        ..OpenChecks::default()
    };
    let outcome = fx.sample(Some(SAMPLE_CHECKSUM)).test_open(&checks).unwrap();
    assert_eq!(outcome, TestOutcome::Success);
}

#[test]
fn open_checksums_the_requested_window() {
    let fx = Fixture::new();
    let spec = TestSpec::new("JRAS", SAMPLE, 1, Some(SAMPLE_WINDOW_CHECKSUM))
        .with_window(Window::new(0, 0, 10, 10));
    let outcome = fx.checker(spec).test_open(&OpenChecks::default()).unwrap();
    assert_eq!(outcome, TestOutcome::Success);
}

#[test]
fn open_reports_checksum_mismatch() {
    let fx = Fixture::new();
    let outcome = fx.sample(Some(4673)).test_open(&OpenChecks::default()).unwrap();
    expect_fail(
        outcome,
        "Checksum for band 1 in \"byte.jras\" is 4672, but expected 4673.",
    );
}

#[test]
fn open_without_expected_checksum_succeeds() {
    let fx = Fixture::new();
    let outcome = fx.sample(None).test_open(&OpenChecks::default()).unwrap();
    assert_eq!(outcome, TestOutcome::Success);
}

#[test]
fn band_zero_disables_band_checks() {
    let fx = Fixture::new();
    let spec = TestSpec::new("JRAS", SAMPLE, 0, Some(1));
    let checks = OpenChecks {
        statistics: Some(Statistics::new(0.0, 0.0, 0.0, 0.0)),
        ..OpenChecks::default()
    };
    assert_eq!(fx.checker(spec).test_open(&checks).unwrap(), TestOutcome::Success);
}

#[test]
fn open_reports_geotransform_mismatch() {
    let fx = Fixture::new();
    let mut shifted = SAMPLE_GEOTRANSFORM;
    shifted[0] += 1.0;
    let checks = OpenChecks {
        geotransform: Some(shifted),
        ..OpenChecks::default()
    };
    expect_fail(
        fx.sample(None).test_open(&checks).unwrap(),
        "Geotransform differs.",
    );

    // Within (60 + 0) / 100.
    let mut nudged = SAMPLE_GEOTRANSFORM;
    nudged[0] += 0.5;
    let checks = OpenChecks {
        geotransform: Some(nudged),
        ..OpenChecks::default()
    };
    assert_eq!(fx.sample(None).test_open(&checks).unwrap(), TestOutcome::Success);

    // An explicit epsilon wins over the default.
    let checks = OpenChecks {
        geotransform: Some(nudged),
        geotransform_epsilon: Some(0.1),
        ..OpenChecks::default()
    };
    expect_fail(
        fx.sample(None).test_open(&checks).unwrap(),
        "Geotransform differs.",
    );
}

#[test]
fn open_reports_projection_mismatch() {
    let fx = Fixture::new();
    let checks = OpenChecks {
        projection: Some("WGS84".to_string()),
        ..OpenChecks::default()
    };
    expect_fail(fx.sample(None).test_open(&checks).unwrap(), "Projections differ");
}

#[test]
fn invalid_expected_projection_is_an_error() {
    let fx = Fixture::new();
    let checks = OpenChecks {
        projection: Some("not a projection".to_string()),
        ..OpenChecks::default()
    };
    assert!(fx.sample(None).test_open(&checks).is_err());
}

#[test]
fn open_reports_statistics_mismatch() {
    let fx = Fixture::new();
    let mut off = SAMPLE_STATISTICS;
    off[2] = 111.0;

    let exact = OpenChecks {
        statistics: Some(Statistics::from(off)),
        ..OpenChecks::default()
    };
    expect_fail(fx.sample(None).test_open(&exact).unwrap(), "Statistics differs.");

    let approx = OpenChecks {
        approx_statistics: Some(Statistics::from(off)),
        ..OpenChecks::default()
    };
    expect_fail(
        fx.sample(None).test_open(&approx).unwrap(),
        "Approximate statistics differs.",
    );

    let loose = OpenChecks {
        statistics: Some(Statistics::from(off)),
        statistics_epsilon: Some(1.0),
        ..OpenChecks::default()
    };
    assert_eq!(fx.sample(None).test_open(&loose).unwrap(), TestOutcome::Success);
}

#[test]
fn open_of_missing_file_fails() {
    let fx = Fixture::new();
    let checker = fx.checker(TestSpec::new("JRAS", "absent.jras", 1, None));
    match checker.test_open(&OpenChecks::default()).unwrap() {
        TestOutcome::Fail(reason) => {
            assert!(reason.starts_with("Failed to open dataset: "));
            assert!(reason.ends_with("absent.jras"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn absolute_paths_bypass_the_data_dir() {
    let fx = Fixture::new();
    let path = fx.config.data_path(SAMPLE);
    let spec = TestSpec::new("JRAS", path.to_string_lossy(), 1, Some(SAMPLE_CHECKSUM))
        .with_absolute_path();
    assert_eq!(
        fx.checker(spec).test_open(&OpenChecks::default()).unwrap(),
        TestOutcome::Success
    );
}

// ── test_create_copy ────────────────────────────────────────────────

#[test]
fn create_copy_round_trip_cleans_up() {
    let fx = Fixture::new();
    let options = CreateCopyOptions {
        check_geotransform: true,
        check_projection: true,
        ..CreateCopyOptions::default()
    };
    let outcome = fx.sample(Some(SAMPLE_CHECKSUM)).test_create_copy(&options).unwrap();
    assert_eq!(outcome, TestOutcome::Success);
    assert!(fx.tmp_entries().is_empty());
}

#[test]
fn create_copy_failure_still_cleans_up() {
    let fx = Fixture::new();
    let outcome = fx
        .sample(Some(SAMPLE_CHECKSUM + 1))
        .test_create_copy(&CreateCopyOptions::default())
        .unwrap();
    expect_fail(
        outcome,
        "Did not get expected checksum on still-open file.\n    Got 4672 instead of 4673.",
    );
    assert!(fx.tmp_entries().is_empty());
}

#[test]
fn create_copy_reports_reopened_mismatch_when_pre_close_check_skipped() {
    let fx = Fixture::new();
    let options = CreateCopyOptions {
        skip_pre_close_check: true,
        ..CreateCopyOptions::default()
    };
    let outcome = fx.sample(Some(1)).test_create_copy(&options).unwrap();
    expect_fail(
        outcome,
        "Did not get expected checksum on reopened file.\n    Got 4672 instead of 1.",
    );
}

#[test]
fn create_copy_in_memory_filesystem() {
    let fx = Fixture::new();
    let options = CreateCopyOptions {
        use_memory_fs: true,
        ..CreateCopyOptions::default()
    };
    let outcome = fx.sample(Some(SAMPLE_CHECKSUM)).test_create_copy(&options).unwrap();
    assert_eq!(outcome, TestOutcome::Success);
    assert!(fx.store.memory_paths().is_empty());
    assert!(fx.tmp_entries().is_empty());
}

#[test]
fn create_copy_to_explicit_target() {
    let fx = Fixture::new();
    let target = fx.root().join("elsewhere").join("copy.jras");
    let options = CreateCopyOptions {
        target: Some(target.clone()),
        ..CreateCopyOptions::default()
    };
    let outcome = fx.sample(Some(SAMPLE_CHECKSUM)).test_create_copy(&options).unwrap();
    assert_eq!(outcome, TestOutcome::Success);
    assert!(!target.exists());
}

#[test]
fn refused_copy_is_a_failure() {
    let fx = Fixture::new();
    let spec = TestSpec::new("JRAS", SAMPLE, 1, Some(SAMPLE_CHECKSUM)).with_options([OPTION_REFUSE]);
    let outcome = fx.checker(spec).test_create_copy(&CreateCopyOptions::default()).unwrap();
    expect_fail(outcome, "Failed to create test file using CreateCopy method.");
    assert!(fx.tmp_entries().is_empty());
}

#[test]
fn kept_artifacts_survive() {
    let config = HarnessConfig {
        keep_artifacts: true,
        ..HarnessConfig::default()
    };
    let fx = Fixture::with_config(config);
    let outcome = fx
        .sample(Some(SAMPLE_CHECKSUM))
        .test_create_copy(&CreateCopyOptions::default())
        .unwrap();
    assert_eq!(outcome, TestOutcome::Success);
    assert_eq!(fx.tmp_entries(), vec!["byte.jras.tst".to_string()]);

    // The kept copy is a real dataset.
    let copy = fx
        .manager
        .open(&fx.config.tmp_path("byte.jras.tst"), Access::ReadOnly)
        .unwrap()
        .unwrap();
    assert_eq!(copy.band(1).unwrap().checksum(None).unwrap(), SAMPLE_CHECKSUM);
    assert_eq!(copy.geo_transform(), Some(SAMPLE_GEOTRANSFORM));
}

// ── test_create ─────────────────────────────────────────────────────

#[test]
fn create_round_trip() {
    let fx = Fixture::new();
    let outcome = fx
        .sample(Some(SAMPLE_CHECKSUM))
        .test_create(&CreateOptions::default())
        .unwrap();
    assert_eq!(outcome, TestOutcome::Success);
    assert!(fx.tmp_entries().is_empty());
}

#[test]
fn create_reports_checksum_mismatch() {
    let fx = Fixture::new();
    let options = CreateOptions {
        output_bands: 1,
        ..CreateOptions::default()
    };
    let outcome = fx.sample(Some(7)).test_create(&options).unwrap();
    expect_fail(
        outcome,
        "Did not get expected checksum on still-open file.\n    Got 4672 instead of 7.",
    );
    assert!(fx.tmp_entries().is_empty());
}

#[test]
fn refused_create_is_a_failure() {
    let fx = Fixture::new();
    let spec = TestSpec::new("JRAS", SAMPLE, 1, None).with_options([OPTION_REFUSE]);
    expect_fail(
        fx.checker(spec).test_create(&CreateOptions::default()).unwrap(),
        "Failed to create test file using Create method.",
    );
    expect_fail(
        fx.checker(TestSpec::new("JRAS", SAMPLE, 1, None).with_options([OPTION_REFUSE]))
            .test_set_metadata()
            .unwrap(),
        "Failed to create test file using Create method.",
    );
}

// ── set-and-verify ──────────────────────────────────────────────────

#[test]
fn set_protocols_round_trip() {
    let fx = Fixture::new();
    let checker = fx.sample(None);
    assert_eq!(checker.test_set_geo_transform().unwrap(), TestOutcome::Success);
    assert_eq!(checker.test_set_projection(None).unwrap(), TestOutcome::Success);
    assert_eq!(
        checker.test_set_projection(Some("EPSG:4326")).unwrap(),
        TestOutcome::Success
    );
    assert_eq!(checker.test_set_metadata().unwrap(), TestOutcome::Success);
    assert_eq!(checker.test_set_no_data_value().unwrap(), TestOutcome::Success);
    assert_eq!(checker.test_set_description().unwrap(), TestOutcome::Success);
    assert!(fx.tmp_entries().is_empty());
}

#[test]
fn set_projection_rejects_unknown_input() {
    let fx = Fixture::new();
    assert!(fx.sample(None).test_set_projection(Some("EPSG:999999")).is_err());
}

// ── drivers that lose data ─────────────────────────────────────────

#[test]
fn create_copy_reports_reopened_min_max() {
    let fx = Fixture::quirky(Quirk::Lossy);
    let outcome = fx
        .quirky_sample(None)
        .test_create_copy(&CreateCopyOptions::default())
        .unwrap();
    expect_fail(
        outcome,
        "Did not get expected min/max values on reopened file.\n    Got 48,175 instead of 47,174.",
    );
    assert!(fx.tmp_entries().is_empty());
}

#[test]
fn create_copy_reports_moved_geotransform() {
    let fx = Fixture::quirky(Quirk::Lossy);
    let options = CreateCopyOptions {
        check_min_max: false,
        check_geotransform: true,
        ..CreateCopyOptions::default()
    };
    let outcome = fx.quirky_sample(None).test_create_copy(&options).unwrap();
    expect_fail(outcome, "Geotransform differs.");
}

#[test]
fn create_copy_reports_swapped_projection() {
    let fx = Fixture::quirky(Quirk::Lossy);
    let options = CreateCopyOptions {
        check_min_max: false,
        check_projection: true,
        ..CreateCopyOptions::default()
    };
    let outcome = fx.quirky_sample(None).test_create_copy(&options).unwrap();
    expect_fail(outcome, "Projections differ");
}

#[test]
fn create_reports_reopened_mismatches() {
    let fx = Fixture::quirky(Quirk::Lossy);
    let options = CreateOptions {
        output_bands: 1,
        ..CreateOptions::default()
    };
    expect_fail(
        fx.quirky_sample(Some(SAMPLE_CHECKSUM)).test_create(&options).unwrap(),
        "Did not get expected checksum on reopened file.",
    );
    expect_fail(
        fx.quirky_sample(None).test_create(&options).unwrap(),
        "Did not get expected min/max values on reopened file.",
    );
    assert!(fx.tmp_entries().is_empty());
}

#[test]
fn set_protocols_report_values_lost_on_reopen() {
    let fx = Fixture::quirky(Quirk::Lossy);
    let checker = fx.quirky_sample(None);
    expect_fail(
        checker.test_set_geo_transform().unwrap(),
        "Did not get expected geotransform.",
    );
    expect_fail(
        checker.test_set_projection(None).unwrap(),
        "Did not get expected projection reference.",
    );
    expect_fail(
        checker.test_set_metadata().unwrap(),
        "Did not get expected metadata item.",
    );
    expect_fail(
        checker.test_set_no_data_value().unwrap(),
        "Did not get expected NoData value.",
    );
    expect_fail(
        checker.test_set_description().unwrap(),
        "Did not get expected description string.",
    );
    assert!(fx.tmp_entries().is_empty());
}

#[test]
fn set_protocols_report_setter_errors() {
    let fx = Fixture::quirky(Quirk::RejectSetters);
    let checker = fx.quirky_sample(None);
    expect_fail(
        checker.test_set_geo_transform().unwrap(),
        "Failed to set geographic transformation.",
    );
    expect_fail(
        checker.test_set_projection(None).unwrap(),
        "Failed to set geographic projection string.",
    );
    expect_fail(checker.test_set_metadata().unwrap(), "Failed to set metadata item.");
    expect_fail(checker.test_set_no_data_value().unwrap(), "Failed to set NoData value.");
    expect_fail(checker.test_set_description().unwrap(), "Failed to set description.");
    assert!(fx.tmp_entries().is_empty());
}

// ── bands without valid pixels ──────────────────────────────────────

#[test]
fn disabled_min_max_tolerates_all_nodata_band() {
    let fx = Fixture::new();
    let mut doc = RasterDocument::new(4, 4, 1, DataType::Byte);
    doc.bands[0].values = vec![9.0; 16];
    doc.bands[0].no_data = Some(9.0);
    fx.add_data("empty.jras", &doc);
    let checker = fx.checker(TestSpec::new("JRAS", "empty.jras", 1, None));

    let copy = CreateCopyOptions {
        check_min_max: false,
        ..CreateCopyOptions::default()
    };
    assert_eq!(checker.test_create_copy(&copy).unwrap(), TestOutcome::Success);
    let create = CreateOptions {
        check_min_max: false,
        ..CreateOptions::default()
    };
    assert_eq!(checker.test_create(&create).unwrap(), TestOutcome::Success);

    // With the comparison on, a band without valid pixels is an error.
    assert!(checker.test_create_copy(&CreateCopyOptions::default()).is_err());
    assert!(fx.tmp_entries().is_empty());
}

// ── capabilities ────────────────────────────────────────────────────

#[test]
fn read_only_driver_skips_writes() {
    let fx = Fixture::read_only();
    let checker = fx.sample(Some(SAMPLE_CHECKSUM));
    assert_eq!(checker.test_driver_exists().unwrap(), TestOutcome::Success);
    assert_eq!(
        checker.test_open(&OpenChecks::default()).unwrap(),
        TestOutcome::Success
    );
    assert_eq!(
        checker.test_create_copy(&CreateCopyOptions::default()).unwrap(),
        TestOutcome::Skip
    );
    assert_eq!(checker.test_create(&CreateOptions::default()).unwrap(), TestOutcome::Skip);
    assert_eq!(checker.test_set_geo_transform().unwrap(), TestOutcome::Skip);
    assert_eq!(checker.test_set_no_data_value().unwrap(), TestOutcome::Skip);
    assert!(fx.tmp_entries().is_empty());
}
