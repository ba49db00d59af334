#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use linux_keycode::{Combo, Key};

    use crate::*;

    /// Parse `src`, expecting a line error, and return its kind and column.
    fn line_err(src: &str) -> (usize, usize, LineError) {
        match load_from_str(src, None) {
            Err(Error::Line {
                line, col, kind, ..
            }) => (line, col, kind),
            other => panic!("expected line error, got {other:?}"),
        }
    }

    fn single_binding(src: &str) -> Binding {
        let cfg = load_from_str(src, None).expect("parse");
        let mut bindings = cfg.bindings();
        let b = bindings.next().expect("one binding").clone();
        assert!(bindings.next().is_none());
        b
    }

    #[test]
    fn basic_line_parses() {
        let b = single_binding("ch=1 ev=2 key=2 thres=30 BASIC 10\n");
        assert_eq!(b.channel, 1);
        assert_eq!(b.note, 2);
        assert_eq!(b.combo, Combo::single(Key::Digit2));
        assert_eq!(b.threshold, 30);
        assert_eq!(
            b.action,
            ActionSpec::Basic {
                release: Duration::from_millis(10)
            }
        );
    }

    #[test]
    fn every_action_kind_parses() {
        let src = "\
# drums
ch=9 ev=36 key=ctrl,z thres=30 VELOCITY 20 200

ch=9 ev=0x26 key=SPACE thres=10 TOGGLE 100 50
ch=9 ev=42 key=w thres=5 REPEAT 150 60
ch=9 ev=48 key=1 thres=20 REPEAT-SEQUENCE 150 60 45 47 43 str=2;3;shift,4
";
        let cfg = load_from_str(src, None).expect("parse");
        let actions: Vec<&ActionSpec> = cfg.bindings().map(|b| &b.action).collect();
        assert_eq!(actions.len(), 4);
        assert_eq!(
            actions[0],
            &ActionSpec::Velocity {
                min_press: Duration::from_millis(20),
                max_press: Duration::from_millis(200),
            }
        );
        assert_eq!(
            actions[1],
            &ActionSpec::Toggle {
                accept_threshold: 100,
                quick_press: Duration::from_millis(50),
            }
        );
        assert_eq!(
            actions[2],
            &ActionSpec::Repeat {
                max_repeat_delay: Duration::from_millis(150),
                short_release: Duration::from_millis(60),
            }
        );
        match actions[3] {
            ActionSpec::RepeatSequence {
                prev,
                next,
                reset,
                groups,
                ..
            } => {
                assert_eq!((*prev, *next, *reset), (45, 47, 43));
                let names: Vec<String> = groups.iter().map(|g| g.to_string()).collect();
                assert_eq!(names, vec!["2", "3", "LEFTSHIFT,4"]);
            }
            other => panic!("unexpected action {other:?}"),
        }
        let toggle = cfg.bindings().nth(1).expect("toggle");
        assert_eq!(toggle.note, 0x26);
    }

    #[test]
    fn directives_parse() {
        let src = "\
@profile racing
ch=9 ev=38 key=UP thres=20 BASIC 40
@profile default
@active racing
@swap ch=9 ev=49 thres=60 racing,menus
@active default
";
        let cfg = load_from_str(src, None).expect("parse");
        assert_eq!(cfg.entries.len(), 6);
        assert_eq!(cfg.entries[0], Entry::Profile(Some("racing".into())));
        assert!(matches!(cfg.entries[1], Entry::Bind(_)));
        assert_eq!(cfg.entries[2], Entry::Profile(None));
        assert_eq!(cfg.entries[3], Entry::Activate(Some("racing".into())));
        assert_eq!(
            cfg.entries[4],
            Entry::Swap(ProfileSwap {
                channel: 9,
                note: 49,
                threshold: 60,
                names: vec!["racing".into(), "menus".into()],
            })
        );
        assert_eq!(cfg.entries[5], Entry::Activate(None));
    }

    #[test]
    fn missing_tokens_are_distinct() {
        assert_eq!(
            line_err("ch=1 ev=2 key=A thres=30").2,
            LineError::TokenCount {
                expected: 5,
                found: 4
            }
        );
        assert_eq!(
            line_err("chan=1 ev=2 key=A thres=30 BASIC 10").2,
            LineError::ChannelTokenMissing
        );
        assert_eq!(
            line_err("ch=1 note=2 key=A thres=30 BASIC 10").2,
            LineError::EventTokenMissing
        );
        assert_eq!(
            line_err("ch=1 ev=2 keys=A thres=30 BASIC 10").2,
            LineError::KeyTokenMissing
        );
        assert_eq!(
            line_err("ch=1 ev=2 key=A t=30 BASIC 10").2,
            LineError::ThresholdTokenMissing
        );
    }

    #[test]
    fn invalid_values_are_distinct() {
        assert_eq!(
            line_err("ch=16 ev=2 key=A thres=30 BASIC 10").2,
            LineError::ChannelInvalid
        );
        assert_eq!(
            line_err("ch=1 ev=256 key=A thres=30 BASIC 10").2,
            LineError::EventInvalid
        );
        assert_eq!(
            line_err("ch=1 ev=2 key=NOPE thres=30 BASIC 10").2,
            LineError::KeyInvalid("invalid key: 'NOPE'".into())
        );
        assert_eq!(
            line_err("ch=1 ev=2 key=A thres=-1 BASIC 10").2,
            LineError::ThresholdInvalid
        );
        assert_eq!(
            line_err("ch=1 ev=2 key=A thres=30 PRESS 10").2,
            LineError::ActionInvalid("PRESS".into())
        );
        assert_eq!(
            line_err("ch=1 ev=2 key=A thres=30 BASIC 0").2,
            LineError::ActionArgumentInvalid("0".into())
        );
        assert_eq!(
            line_err("ch=1 ev=2 key=A thres=30 TOGGLE 129 50").2,
            LineError::ActionArgumentInvalid("129".into())
        );
        assert_eq!(
            line_err("ch=1 ev=2 key=A thres=30 BASIC 10 20").2,
            LineError::TokenCount {
                expected: 6,
                found: 7
            }
        );
    }

    #[test]
    fn sequence_requires_group_list() {
        let (_, _, kind) =
            line_err("ch=1 ev=2 key=A thres=30 REPEAT-SEQUENCE 150 60 3 4 5 6");
        assert_eq!(kind, LineError::ActionArgumentInvalid("6".into()));
        let (_, col, kind) =
            line_err("ch=1 ev=2 key=A thres=30 REPEAT-SEQUENCE 150 60 3 4 5 str=B;ZZ");
        assert_eq!(kind, LineError::KeyInvalid("invalid key: 'ZZ'".into()));
        assert_eq!(col, 61);
    }

    #[test]
    fn bad_directives() {
        assert_eq!(
            line_err("@mode racing").2,
            LineError::DirectiveInvalid("@mode".into())
        );
        assert_eq!(
            line_err("@swap ch=1 ev=2 thres=3 a,,b").2,
            LineError::ProfileNameInvalid(String::new())
        );
        assert_eq!(
            line_err("@swap ch=1 ev=2 thres=3 a,default").2,
            LineError::ProfileNameInvalid("default".into())
        );
        assert_eq!(
            line_err("@profile").2,
            LineError::TokenCount {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn error_reports_line_and_column() {
        let src = "# header\n\nch=1 ev=2 key=A thres=300 BASIC 10\n";
        let (line, col, kind) = line_err(src);
        assert_eq!(line, 3);
        assert_eq!(col, 23);
        assert_eq!(kind, LineError::ThresholdInvalid);
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.txt");
        fs::write(&path, "ch=1 ev=2 key=A thres=30 BASIC 10\n").expect("write");
        let cfg = load_from_path(&path).expect("load");
        assert_eq!(cfg.bindings().count(), 1);

        let bad = dir.path().join("bad.txt");
        fs::write(&bad, "ch=1 ev=2 key=A thres=30 BASIC x\n").expect("write");
        let err = load_from_path(&bad).expect_err("bad line");
        assert_eq!(err.path(), Some(bad.as_path()));
        assert!(err.pretty().contains("bad.txt:1:32"));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::load(&dir.path().join("absent.txt")).expect_err("missing");
        assert!(matches!(err, Error::Read { .. }));
    }
}
