use clamp_protocol::{Normalization, ReferenceData};

fn reference(name: &str) -> ReferenceData {
    ReferenceData {
        name: name.to_string(),
        file: None,
        x0: 0.0,
        scale: 1.0,
        weight: 1.0,
        normalization: Normalization::None,
        variable_set_index: 0,
        row_index: 0,
        column_index: 0,
        column_titles: Vec::new(),
        column_data: Vec::new(),
    }
}

#[test]
fn parses_tab_separated_columns() {
    let mut data = reference("O");
    data.parse_text("t\tO\n0 0.1\n1 0.2\n2 0.3\n").unwrap();
    assert_eq!(data.column_titles, vec!["t", "O"]);
    assert_eq!(data.column_data.len(), 2);
    assert_eq!(data.column_data[0], vec![0.0, 1.0, 2.0]);
    assert_eq!(data.column_data[1], vec![0.1, 0.2, 0.3]);
}

#[test]
fn short_rows_are_zero_filled() {
    let mut data = reference("O");
    data.parse_text("t\tO\n0 0.5\n1\n").unwrap();
    assert_eq!(data.column_data[1], vec![0.5, 0.0]);
}

#[test]
fn non_numeric_field_fails_with_the_text() {
    let mut data = reference("O");
    let err = data.parse_text("t\tO\n0 oops\n").unwrap_err();
    assert!(err.to_string().contains("oops"));
}

#[test]
fn xyy_layout_pairs_first_column_with_each_other_column() {
    let mut data = reference("O");
    data.parse_text("t\ta\tb\n0 1 2\n1 3 4\n").unwrap();
    assert_eq!(data.column_pairs_xy(), vec![(0, 1), (0, 2)]);
}

#[test]
fn xyxy_layout_pairs_adjacent_columns() {
    let mut data = reference("O");
    data.parse_text("t\ta\tt\tb\n0 1 0 2\n1 3 1 4\n").unwrap();
    assert_eq!(data.column_pairs_xy(), vec![(0, 1), (2, 3)]);
}

#[test]
fn normalisation_picks_the_dominant_extreme() {
    let mut data = reference("O");
    data.normalization = Normalization::ToAbsMinMax;
    let mut wave = vec![1.0, -4.0, 2.0];
    data.apply_normalization(&mut wave);
    assert_eq!(wave, vec![-0.25, 1.0, -0.5]);

    let mut data = reference("O");
    data.normalization = Normalization::ToMax;
    data.scale = 2.0;
    let mut wave = vec![1.0, 4.0, 2.0];
    data.apply_normalization(&mut wave);
    assert_eq!(wave, vec![0.5, 2.0, 1.0]);
}
