//! 順問題と逆問題の間で受け渡す解データ表。
//!
//! 形式は空白区切りのテキストで、1行目は `x t u` というヘッダ、
//! 2行目以降は小数点以下6桁の3列です。列の並びは書き手と読み手で共有する契約です。

use crate::error::{PinnError, Result};
use std::fs;
use std::path::Path;

/// ヘッダ行。
pub const HEADER: &str = "x t u";

/// 表の1行。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolutionRow {
    pub x: f64,
    pub t: f64,
    pub u: f64,
}

/// (x, t, u) の組の表。行の順序に意味はありません。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolutionTable {
    rows: Vec<SolutionRow>,
}

impl SolutionTable {
    pub fn from_rows(rows: Vec<SolutionRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[SolutionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 入力座標 (x, t) の一覧。
    pub fn inputs(&self) -> Vec<[f64; 2]> {
        self.rows.iter().map(|row| [row.x, row.t]).collect()
    }

    /// 出力 u の一覧。
    pub fn outputs(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.u).collect()
    }

    /// 同じ時刻の行をまとめ、出現順に (t, [(x, u)]) として返します。
    pub fn time_slices(&self) -> Vec<(f64, Vec<(f64, f64)>)> {
        let mut slices: Vec<(f64, Vec<(f64, f64)>)> = Vec::new();
        for row in &self.rows {
            match slices.iter_mut().find(|(t, _)| (t - row.t).abs() < 1e-9) {
                Some((_, points)) => points.push((row.x, row.u)),
                None => slices.push((row.t, vec![(row.x, row.u)])),
            }
        }
        slices
    }

    /// テキスト形式に整形します。
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(HEADER.len() + 1 + self.rows.len() * 32);
        text.push_str(HEADER);
        text.push('\n');
        for row in &self.rows {
            text.push_str(&format!("{:.6} {:.6} {:.6}\n", row.x, row.t, row.u));
        }
        text
    }

    /// テキストを解釈します。`path` はエラーメッセージにのみ使います。
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines.next().unwrap_or_default();
        if header.split_whitespace().collect::<Vec<_>>() != ["x", "t", "u"] {
            return Err(PinnError::MissingHeader {
                path: path.to_path_buf(),
                found: header.to_string(),
            });
        }

        let mut rows = Vec::new();
        for (index, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let malformed = || PinnError::MalformedRow {
                path: path.to_path_buf(),
                line: index + 2,
                content: line.to_string(),
            };
            let fields = line
                .split_whitespace()
                .map(|field| field.parse::<f64>().ok().filter(|v| v.is_finite()))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(malformed)?;
            let [x, t, u] = fields[..] else {
                return Err(malformed());
            };
            rows.push(SolutionRow { x, t, u });
        }

        if rows.is_empty() {
            return Err(PinnError::EmptyTable {
                path: path.to_path_buf(),
            });
        }
        Ok(Self { rows })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_text()).map_err(|e| PinnError::io(path, e))
    }

    /// ファイルから読み込みます。存在しない場合はパスを含む`Io`エラーになります。
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| PinnError::io(path, e))?;
        Self::parse(&text, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Domain;

    fn grid_table() -> SolutionTable {
        let domain = Domain::new(1.0, 1.0);
        let mut rows = Vec::new();
        for t in domain.time_steps(5) {
            for x in domain.spatial_grid(100) {
                let u = -(std::f64::consts::PI * x).sin() * (-t).exp();
                rows.push(SolutionRow { x, t, u });
            }
        }
        SolutionTable::from_rows(rows)
    }

    #[test]
    fn text_has_header_and_500_rows() {
        let text = grid_table().to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 501);
        assert_eq!(lines[0], "x t u");
        assert_eq!(lines[1], "-1.000000 0.000000 0.000000");

        let mut times: Vec<&str> = lines[1..]
            .iter()
            .map(|line| line.split_whitespace().nth(1).unwrap())
            .collect();
        times.dedup();
        assert_eq!(
            times,
            ["0.000000", "0.250000", "0.500000", "0.750000", "1.000000"]
        );
    }

    #[test]
    fn reload_reproduces_text_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forward_solution.dat");
        let table = grid_table();
        table.write(&path).unwrap();

        let reloaded = SolutionTable::read(&path).unwrap();
        assert_eq!(reloaded.len(), 500);
        assert_eq!(reloaded.to_text(), std::fs::read_to_string(&path).unwrap());
        assert_eq!(
            reloaded.inputs().iter().map(|p| p[1]).collect::<Vec<_>>(),
            table.inputs().iter().map(|p| p[1]).collect::<Vec<_>>()
        );
    }

    #[test]
    fn time_slices_group_rows() {
        let slices = grid_table().time_slices();
        assert_eq!(slices.len(), 5);
        assert!(slices.iter().all(|(_, points)| points.len() == 100));
        assert_eq!(slices[2].0, 0.5);
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forward_solution.dat");
        let err = SolutionTable::read(&path).unwrap_err();
        match &err {
            PinnError::Io { path: p, source } => {
                assert_eq!(p, &path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("forward_solution.dat"));
    }

    #[test]
    fn rejects_missing_header() {
        let err = SolutionTable::parse("0.1 0.2 0.3\n", Path::new("a.dat")).unwrap_err();
        assert!(matches!(err, PinnError::MissingHeader { .. }));
    }

    #[test]
    fn rejects_wrong_column_count() {
        let text = "x t u\n0.1 0.2 0.3\n0.1 0.2\n";
        let err = SolutionTable::parse(text, Path::new("a.dat")).unwrap_err();
        assert!(matches!(err, PinnError::MalformedRow { line: 3, .. }));
    }

    #[test]
    fn rejects_non_numeric_field() {
        let text = "x t u\n0.1 abc 0.3\n";
        let err = SolutionTable::parse(text, Path::new("a.dat")).unwrap_err();
        assert!(matches!(err, PinnError::MalformedRow { line: 2, .. }));
    }

    #[test]
    fn rejects_non_finite_values() {
        for (text, line) in [
            ("x t u\n0.1 0.2 NaN\n", 2),
            ("x t u\n0.1 0.2 0.3\ninf 0.2 0.3\n", 3),
            ("x t u\n0.1 -infinity 0.3\n", 2),
        ] {
            let err = SolutionTable::parse(text, Path::new("a.dat")).unwrap_err();
            assert!(
                matches!(err, PinnError::MalformedRow { line: l, .. } if l == line),
                "{text:?}: {err}"
            );
        }
    }

    #[test]
    fn rejects_header_only() {
        let err = SolutionTable::parse("x t u\n", Path::new("a.dat")).unwrap_err();
        assert!(matches!(err, PinnError::EmptyTable { .. }));
    }
}
