mod common;
use common::{events_for_code, synthetic_recording, write_subject};
use erp::epoch::Condition;
use erp::{grand_average, Evoked, IcaConfig, PipelineConfig};

fn test_config(root: &std::path::Path) -> PipelineConfig {
    PipelineConfig {
        data_dir: root.join("data"),
        out_dir: root.join("derivatives"),
        ica: IcaConfig { n_components: 4, ..IcaConfig::default() },
        ..PipelineConfig::default()
    }
}

#[test]
fn two_subjects_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());

    for subject in ["01", "02"] {
        let mut events = events_for_code(6, 4, 500, 3000);
        events.extend(events_for_code(7, 4, 1500, 3000));
        let rec = synthetic_recording(4, 15000, 250.0, events);
        write_subject(&cfg.data_dir, subject, &rec);
    }

    let subjects = vec!["01".to_string(), "02".to_string()];
    let outcomes = erp::run_subjects(&cfg, &subjects);
    assert!(outcomes.iter().all(|(_, r)| r.is_ok()));

    for subject in &subjects {
        for condition in ["feedback", "cue-win", "cue-loss"] {
            let path = cfg.evoked_path(subject, condition);
            assert!(path.exists(), "missing {}", path.display());
            let ev = Evoked::load(&path).unwrap();
            assert_eq!(ev.data.nrows(), 4);
            assert_eq!(ev.data.ncols(), 201);
            assert_eq!(ev.sfreq, 250.0);
            assert_eq!(&ev.subject, subject);
        }
        // Diagnostics were written.
        assert!(cfg.plots_dir().join(format!("sub-{subject}_psd.html")).exists());
        assert!(cfg
            .plots_dir()
            .join(format!("sub-{subject}_feedback_evoked.html"))
            .exists());
        assert!(cfg
            .plots_dir()
            .join(format!("sub-{subject}_feedback_topo.html"))
            .exists());
    }

    // Epoch bookkeeping: 4 win + 4 loss → 8 feedback, none rejected.
    let (_, report) = &outcomes[0];
    let report = report.as_ref().unwrap();
    let feedback = report
        .conditions
        .iter()
        .find(|c| c.condition == Condition::Feedback)
        .unwrap();
    assert_eq!(feedback.n_epochs, 8);
    assert_eq!(feedback.n_rejected, 0);

    // Grand average over the two written files equals their file-level mean.
    let ga = grand_average(&cfg, &subjects, Condition::Feedback).unwrap();
    assert!(ga.excluded.is_empty());
    let a = Evoked::load(&cfg.evoked_path("01", "feedback")).unwrap();
    let b = Evoked::load(&cfg.evoked_path("02", "feedback")).unwrap();
    let expected = (&a.data + &b.data) / 2.0;
    approx::assert_abs_diff_eq!(
        ga.evoked.data.as_slice().unwrap(),
        expected.as_slice().unwrap(),
        epsilon = 1e-15
    );
}

#[test]
fn hand_computed_average_survives_the_file_layer() {
    // Stages 2+3 on recordings with analytically known epochs: impulse of
    // 40 µV (subject 01) and 20 µV (subject 02) at +100 samples after each
    // marker, zero elsewhere.  The grand average at that latency is 30 µV.
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    std::fs::create_dir_all(&cfg.out_dir).unwrap();

    for (subject, amp) in [("01", 40e-6), ("02", 20e-6)] {
        let mut rec = synthetic_recording(2, 4000, 250.0, events_for_code(6, 2, 500, 2000));
        rec.data.fill(0.0);
        for ev in &rec.events {
            rec.data[[0, (ev.sample + 100) as usize]] = amp;
        }
        let set = erp::extract_epochs(&rec, Condition::CueWin, &cfg).unwrap();
        assert_eq!(set.n_epochs(), 2);
        let ev = Evoked::from_epochs(&set, subject, &rec.ch_names).unwrap();
        // Window starts at −50 samples, so +100 lands at index 150.
        approx::assert_abs_diff_eq!(ev.data[[0, 150]], amp, epsilon = 1e-18);
        ev.save(&cfg.evoked_path(subject, "cue-win")).unwrap();
    }

    let subjects = vec!["01".to_string(), "02".to_string()];
    let ga = grand_average(&cfg, &subjects, Condition::CueWin).unwrap();
    approx::assert_abs_diff_eq!(ga.evoked.data[[0, 150]], 30e-6, epsilon = 1e-18);
    approx::assert_abs_diff_eq!(ga.evoked.data[[1, 150]], 0.0, epsilon = 1e-18);

    // Dropping one subject's file changes the grand average.
    std::fs::remove_file(cfg.evoked_path("02", "cue-win")).unwrap();
    let ga_one = grand_average(&cfg, &subjects, Condition::CueWin).unwrap();
    assert_eq!(ga_one.inputs.len(), 1);
    assert_eq!(ga_one.excluded.len(), 1);
    approx::assert_abs_diff_eq!(ga_one.evoked.data[[0, 150]], 40e-6, epsilon = 1e-18);
}

#[test]
fn shape_mismatched_subject_file_is_excluded_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    std::fs::create_dir_all(&cfg.out_dir).unwrap();

    for (subject, n_ch) in [("01", 2usize), ("02", 2), ("03", 5)] {
        let rec = synthetic_recording(n_ch, 4000, 250.0, events_for_code(6, 2, 500, 2000));
        let set = erp::extract_epochs(&rec, Condition::CueWin, &cfg).unwrap();
        let ev = Evoked::from_epochs(&set, subject, &rec.ch_names).unwrap();
        ev.save(&cfg.evoked_path(subject, "cue-win")).unwrap();
    }

    let subjects: Vec<String> = ["01", "02", "03"].iter().map(|s| s.to_string()).collect();
    let ga = grand_average(&cfg, &subjects, Condition::CueWin).unwrap();
    assert_eq!(ga.inputs.len(), 2);
    assert_eq!(ga.excluded.len(), 1);
    assert_eq!(ga.excluded[0].0, "03");
    assert_eq!(ga.evoked.data.nrows(), 2);
}
