use fpvtune_core::{gain_key, Axis, FilterMap, Gain, MiscMap, ParameterSet, SettingKey, SettingMap};
use std::fmt::Write;

const HEADER: &str = "# Betaflight CLI generated by fpvtune";

fn write_section<K: SettingKey>(out: &mut String, title: &str, map: &SettingMap<K>) {
    let mut entries = map.iter_set().peekable();
    if entries.peek().is_none() {
        return;
    }
    let _ = writeln!(out, "\n# {}", title);
    for (key, value) in entries {
        let _ = writeln!(out, "set {} = {}", key.name(), value);
    }
}

/// Render Betaflight CLI text.
///
/// The PID section always lists every gain of every axis, zeros included. Filter and
/// misc sections list only set values and disappear when empty. The text ends with a
/// single `save`.
pub fn serialize(parameters: &ParameterSet, filters: &FilterMap, misc: &MiscMap) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');

    out.push_str("\n# PID\n");
    for axis in Axis::ALL {
        let gains = parameters.axis(axis);
        for gain in Gain::ALL {
            let _ = writeln!(out, "set {} = {}", gain_key(gain, axis), gains.get(gain));
        }
    }

    write_section(&mut out, "Filters", filters);
    write_section(&mut out, "Other", misc);

    out.push_str("\nsave\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpvtune_core::{AxisGains, FilterKey, MiscKey};

    fn params() -> ParameterSet {
        ParameterSet {
            roll: AxisGains::new(52, 80, 45, 130),
            pitch: AxisGains::new(55, 84, 48, 135),
            yaw: AxisGains::new(45, 80, 0, 120),
        }
    }

    #[test]
    fn test_pid_only_output() {
        let cli = serialize(&params(), &FilterMap::new(), &MiscMap::new());
        let lines: Vec<&str> = cli.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[2], "# PID");
        assert_eq!(lines[3], "set p_roll = 52");
        assert_eq!(lines[14], "set f_yaw = 120");
        assert!(cli.contains("set d_yaw = 0\n"));
        assert!(!cli.contains("# Filters"));
        assert!(!cli.contains("# Other"));
        assert!(cli.ends_with("\n\nsave\n"));
    }

    #[test]
    fn test_sections_follow_key_order_and_skip_zeros() {
        let mut filters = FilterMap::new();
        filters.set(FilterKey::DynNotchCount, 2);
        filters.set(FilterKey::GyroLpf1StaticHz, 250);
        filters.set(FilterKey::DtermLpf2StaticHz, 0);
        let mut misc = MiscMap::new();
        misc.set(MiscKey::TpaRate, 65);

        let cli = serialize(&params(), &filters, &misc);
        let tail: Vec<&str> = cli.lines().skip(15).collect();
        assert_eq!(
            tail,
            vec![
                "",
                "# Filters",
                "set gyro_lpf1_static_hz = 250",
                "set dyn_notch_count = 2",
                "",
                "# Other",
                "set tpa_rate = 65",
                "",
                "save",
            ]
        );
    }

    #[test]
    fn test_single_save() {
        let cli = serialize(&params(), &FilterMap::new(), &MiscMap::new());
        assert_eq!(cli.lines().filter(|line| line.trim() == "save").count(), 1);
    }
}
