//! End-to-end scenarios driven through the public analyzer API.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use open_hlasm_parser::context::variables::SetValue;
use open_hlasm_parser::{Analyzer, AnalysisResult, EmptyLibrary, MapLibrary};

fn analyze(source: &str) -> AnalysisResult {
    Analyzer::new(source, "test.hlasm", &EmptyLibrary).analyze()
}

fn analyze_with(source: &str, lib: &MapLibrary) -> AnalysisResult {
    Analyzer::new(source, "test.hlasm", lib).analyze()
}

// ---------------------------------------------------------------------------
//  SET symbols
// ---------------------------------------------------------------------------

#[test]
fn seta_scalar_then_array() {
    let result = analyze(
        "         LCLA  &I
&I       SETA  5
&ARR(1)  SETA  10
&ARR(3)  SETA  30
",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.context.set_symbol_value("I", 1), Some(SetValue::A(5)));
    assert_eq!(
        result.context.set_symbol_value("ARR", 1),
        Some(SetValue::A(10))
    );
    // The array is sparse; unset entries read as zero.
    assert_eq!(
        result.context.set_symbol_value("ARR", 2),
        Some(SetValue::A(0))
    );
    assert_eq!(
        result.context.set_symbol_value("ARR", 3),
        Some(SetValue::A(30))
    );
}

#[test]
fn setc_kind_conflict_rejected() {
    let result = analyze(
        "&X       SETA  1
&X       SETC  'HI'
",
    );
    assert_eq!(result.codes(), vec!["E013"]);
    // The first assignment stays in effect.
    assert_eq!(result.context.set_symbol_value("X", 1), Some(SetValue::A(1)));
}

#[test]
fn set_without_label_is_e010() {
    let result = analyze("         SETA  5\n");
    assert_eq!(result.codes(), vec!["E010"]);
}

#[test]
fn set_without_operand_is_e022() {
    let result = analyze("&X       SETA\n");
    assert_eq!(result.codes(), vec!["E022"]);
}

#[test]
fn set_subscript_errors() {
    let result = analyze("&X(1,2)  SETA  5\n");
    assert_eq!(result.codes(), vec!["E020"]);

    let result = analyze("&X(0)    SETA  5\n");
    assert_eq!(result.codes(), vec!["E012"]);
}

#[test]
fn setc_string_values() {
    let result = analyze(
        "&A       SETC  'AB'
&B       SETC  '&A.CD'
",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(
        result.context.set_symbol_value("B", 1),
        Some(SetValue::C("ABCD".into()))
    );
}

// ---------------------------------------------------------------------------
//  LCL / GBL declarations
// ---------------------------------------------------------------------------

#[test]
fn lcl_duplicate_is_e051() {
    let result = analyze(
        "         LCLA  &A
         LCLA  &A
",
    );
    assert_eq!(result.codes(), vec!["E051"]);
}

#[test]
fn lcl_with_label_warns_w010() {
    let result = analyze("LBL      LCLA  &A\n");
    assert_eq!(result.codes(), vec!["W010"]);
}

#[test]
fn lcl_non_variable_operand_is_e010() {
    let result = analyze("         LCLA  FOO\n");
    assert_eq!(result.codes(), vec!["E010"]);
}

#[test]
fn declaring_macro_param_is_e052() {
    let result = analyze(
        "         MACRO
         M1    &P
         LCLA  &P
         MEND
         M1    X
",
    );
    assert_eq!(result.codes(), vec!["E052"]);
}

#[test]
fn assigning_macro_param_is_e030() {
    let result = analyze(
        "         MACRO
         M2    &P
&P       SETA  1
         MEND
         M2    X
",
    );
    assert_eq!(result.codes(), vec!["E030"]);
}

// ---------------------------------------------------------------------------
//  AGO / AIF / sequence symbols
// ---------------------------------------------------------------------------

#[test]
fn ago_computed_branch() {
    let result = analyze(
        "         LCLA  &X
         AGO   (2).L1,.L2,.L3
.L1      ANOP
&X       SETA  1
.L2      ANOP
&X       SETA  2
.L3      ANOP
",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    // Branch 2 selects .L2; the assignment under .L1 is skipped.
    assert_eq!(result.context.set_symbol_value("X", 1), Some(SetValue::A(2)));
    // One successful jump decrements the branch counter.
    assert_eq!(result.context.branch_counter(), 4095);
}

#[test]
fn ago_forward_via_lookahead() {
    let result = analyze(
        "         LCLA  &X
         AGO   .LATER
&X       SETA  1
.LATER   ANOP
&X       SETA  2
",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.context.set_symbol_value("X", 1), Some(SetValue::A(2)));
}

#[test]
fn backward_jump_loop() {
    let result = analyze(
        "         LCLA  &N
.TOP     ANOP
&N       SETA  &N+1
         AIF   (&N LT 3).TOP
",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.context.set_symbol_value("N", 1), Some(SetValue::A(3)));
}

#[test]
fn ago_missing_target_is_e047_and_terminates() {
    let result = analyze(
        "         AGO   .NOPE
         ANOP
",
    );
    assert_eq!(result.codes(), vec!["E047"]);
}

#[test]
fn ago_empty_operand_list_is_e022() {
    let result = analyze("         AGO\n");
    assert_eq!(result.codes(), vec!["E022"]);
}

#[test]
fn aif_first_true_branch_wins() {
    let result = analyze(
        "         LCLA  &R
         AIF   (0 EQ 1).A,(1 EQ 1).B,
&R       SETA  1
.A       ANOP
&R       SETA  2
.B       ANOP
&R       SETA  3
",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.context.set_symbol_value("R", 1), Some(SetValue::A(3)));
}

#[test]
fn duplicate_sequence_symbol_is_e045() {
    let result = analyze(
        ".L       ANOP
.L       ANOP
",
    );
    assert_eq!(result.codes(), vec!["E045"]);
}

#[test]
fn reprocessed_sequence_symbol_is_not_a_duplicate() {
    // The backward jump re-processes .TOP; the re-registration is at the
    // same position and must not raise E045.
    let result = analyze(
        "         LCLA  &N
.TOP     ANOP
&N       SETA  &N+1
         AIF   (&N LT 2).TOP
",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
}

// ---------------------------------------------------------------------------
//  MACRO / MEND / MEXIT / ACTR
// ---------------------------------------------------------------------------

#[test]
fn misplaced_mend_and_mexit_are_e054() {
    let result = analyze("         MEND\n");
    assert_eq!(result.codes(), vec!["E054"]);

    let result = analyze("         MEXIT\n");
    assert_eq!(result.codes(), vec!["E054"]);
}

#[test]
fn macro_definition_and_expansion() {
    let result = analyze(
        "         MACRO
         DOUBLE &VAL
         GBLA  &RESULT
&RESULT  SETA  &VAL+&VAL
         MEND
         GBLA  &RESULT
         DOUBLE 4
",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.context.global_value("RESULT", 1), Some(SetValue::A(8)));
    assert_eq!(result.xref().macro_definitions.len(), 1);
}

#[test]
fn macro_keyword_parameters_and_defaults() {
    let result = analyze(
        "         MACRO
         STORE &A,&K=XY
         GBLC  &OUT
&OUT     SETC  '&A/&K'
         MEND
         GBLC  &OUT
         STORE P1,K=ZZ
",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(
        result.context.global_value("OUT", 1),
        Some(SetValue::C("P1/ZZ".into()))
    );

    let result = analyze(
        "         MACRO
         STORE &A,&K=XY
         GBLC  &OUT
&OUT     SETC  '&A/&K'
         MEND
         GBLC  &OUT
         STORE P1
",
    );
    assert_eq!(
        result.context.global_value("OUT", 1),
        Some(SetValue::C("P1/XY".into()))
    );
}

#[test]
fn mexit_leaves_macro_early() {
    let result = analyze(
        "         MACRO
         EARLY
         GBLA  &X
&X       SETA  1
         MEXIT
&X       SETA  2
         MEND
         GBLA  &X
         EARLY
",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.context.global_value("X", 1), Some(SetValue::A(1)));
}

#[test]
fn actr_limits_macro_jumps() {
    let result = analyze(
        "         MACRO
         LOOPY
         GBLA  &N
         ACTR  2
.TOP     ANOP
&N       SETA  &N+1
         AGO   .TOP
         MEND
         GBLA  &N
         LOOPY
",
    );
    // Two jumps are allowed; the third attempt terminates the invocation.
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.context.global_value("N", 1), Some(SetValue::A(3)));
}

#[test]
fn model_statement_substitution() {
    let result = analyze(
        "         MACRO
         MAKE  &NAME,&LEN
&NAME    DS    CL&LEN
         MEND
         MAKE  BUF,12
",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let id = result.context.ids.find("BUF").unwrap();
    let sym = result.context.ord.lookup(id).expect("BUF defined");
    assert_eq!(sym.attributes.length, 12);
    assert_eq!(sym.attributes.type_attr, 'C');
}

// ---------------------------------------------------------------------------
//  DC / DS
// ---------------------------------------------------------------------------

#[test]
fn dc_validation_scenario() {
    let result = analyze(
        "A        DC    F'1,-2E3,+4.5'
B        DC    P'12,-345'
C        DC    H'1,'
",
    );
    assert_eq!(result.codes(), vec!["D010"]);

    let ctx = &result.context;
    let a = ctx.ord.lookup(ctx.ids.find("A").unwrap()).unwrap();
    assert_eq!(a.attributes.length, 4);
    assert_eq!(a.attributes.type_attr, 'F');
    assert_eq!(a.value.numeric(), 0);

    // Line 1 emits 12 bytes; B follows unaligned.
    let b = ctx.ord.lookup(ctx.ids.find("B").unwrap()).unwrap();
    assert_eq!(b.value.numeric(), 12);
}

#[test]
fn ds_defines_attributes_without_nominal() {
    let result = analyze("FIELD    DS    CL20\n");
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let ctx = &result.context;
    let sym = ctx.ord.lookup(ctx.ids.find("FIELD").unwrap()).unwrap();
    assert_eq!(sym.attributes.length, 20);
    assert_eq!(sym.attributes.type_attr, 'C');
}

#[test]
fn duplicate_label_is_e031() {
    let result = analyze(
        "X        DS    F
X        DS    H
",
    );
    assert_eq!(result.codes(), vec!["E031"]);
}

#[test]
fn equ_defines_absolute_symbols() {
    let result = analyze(
        "TEN      EQU   10
FIFTEEN  EQU   TEN+5
",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let ctx = &result.context;
    let sym = ctx.ord.lookup(ctx.ids.find("FIFTEEN").unwrap()).unwrap();
    assert_eq!(sym.value.numeric(), 15);
}

#[test]
fn forward_attribute_reference_via_lookahead() {
    let result = analyze(
        "         LCLA  &L
&L       SETA  L'FIELD
FIELD    DS    CL20
",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(
        result.context.set_symbol_value("L", 1),
        Some(SetValue::A(20))
    );
}

// ---------------------------------------------------------------------------
//  COPY members
// ---------------------------------------------------------------------------

#[test]
fn copy_member_replay() {
    let mut lib = MapLibrary::new();
    lib.insert(
        "CONSTS",
        "VAL      EQU   10
LEN      EQU   VAL+5
",
    );
    let result = analyze_with(
        "         COPY  CONSTS
X        DC    F'1'
",
        &lib,
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let ctx = &result.context;
    assert_eq!(ctx.ord.lookup(ctx.ids.find("VAL").unwrap()).unwrap().value.numeric(), 10);
    assert_eq!(ctx.ord.lookup(ctx.ids.find("LEN").unwrap()).unwrap().value.numeric(), 15);
}

#[test]
fn copy_sequence_symbol_jump_across_member() {
    let mut lib = MapLibrary::new();
    lib.insert(
        "FLOW",
        "         AGO   .SKIP
&X       SETA  1
.SKIP    ANOP
",
    );
    let result = analyze_with(
        "         LCLA  &X
         COPY  FLOW
",
        &lib,
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.context.set_symbol_value("X", 1), Some(SetValue::A(0)));
}

#[test]
fn unknown_copy_member_is_e058() {
    let result = analyze("         COPY  NOPE\n");
    assert_eq!(result.codes(), vec!["E058"]);
}

#[test]
fn recursive_copy_is_e062() {
    let mut lib = MapLibrary::new();
    lib.insert("SELF", "         COPY  SELF\n");
    let result = analyze_with("         COPY  SELF\n", &lib);
    assert_eq!(result.codes(), vec!["E062"]);
}

// ---------------------------------------------------------------------------
//  External macros and unknown operation codes
// ---------------------------------------------------------------------------

#[test]
fn external_macro_resolution() {
    let mut lib = MapLibrary::new();
    lib.insert(
        "TWICE",
        "         MACRO
         TWICE &V
         GBLA  &OUT
&OUT     SETA  &V+&V
         MEND
",
    );
    let result = analyze_with(
        "         GBLA  &OUT
         TWICE 21
",
        &lib,
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.context.global_value("OUT", 1), Some(SetValue::A(42)));
}

#[test]
fn unknown_operation_code_is_e049() {
    let result = analyze("         FROBNICATE 1,2\n");
    assert_eq!(result.codes(), vec!["E049"]);
}

// ---------------------------------------------------------------------------
//  Machine statements and cross references
// ---------------------------------------------------------------------------

#[test]
fn machine_labels_and_location_counter() {
    let result = analyze(
        "CSECT1   CSECT
ENTRY    LR    1,2
         MVC   0(8,1),0(2)
AFTER    DS    0H
",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let ctx = &result.context;
    let entry = ctx.ord.lookup(ctx.ids.find("ENTRY").unwrap()).unwrap();
    assert_eq!(entry.value.numeric(), 0);
    assert_eq!(entry.attributes.length, 2);
    assert_eq!(entry.attributes.type_attr, 'I');
    let after = ctx.ord.lookup(ctx.ids.find("AFTER").unwrap()).unwrap();
    assert_eq!(after.value.numeric(), 8);
}

#[test]
fn xref_tables_are_populated() {
    let result = analyze(
        "TEN      EQU   10
.HERE    ANOP
         AGO   .HERE2
.HERE2   ANOP
",
    );
    let xref = result.xref();
    assert!(xref
        .ordinary_definitions
        .iter()
        .any(|d| d.value_desc.contains(&"Absolute Symbol".to_string())));
    assert!(!xref.seq_symbol_definitions.is_empty());
    assert_eq!(xref.seq_symbol_references.len(), 1);
}

#[test]
fn mnote_severities() {
    let result = analyze(
        "         MNOTE 8,'SERIOUS'
         MNOTE 2,'MILD'
         MNOTE *,'COMMENT'
",
    );
    let codes = result.codes();
    assert_eq!(codes, vec!["MNOTE", "MNOTE", "MNOTE"]);
    assert!(result.diagnostics[0].is_error());
    assert!(result.diagnostics[1].is_warning());
    assert!(!result.diagnostics[2].is_error() && !result.diagnostics[2].is_warning());
}

// ---------------------------------------------------------------------------
//  Cancellation
// ---------------------------------------------------------------------------

#[test]
fn cancellation_stops_before_processing() {
    let cancel = Arc::new(AtomicBool::new(true));
    let result = Analyzer::new(
        "&I       SETA  5
X        DS    F
",
        "test.hlasm",
        &EmptyLibrary,
    )
    .with_cancellation(cancel)
    .analyze();

    assert!(result.diagnostics.is_empty());
    assert_eq!(result.context.set_symbol_value("I", 1), None);
    // The deferred cross-reference flush is skipped on cancellation.
    assert!(result.xref().ordinary_definitions.is_empty());
}
