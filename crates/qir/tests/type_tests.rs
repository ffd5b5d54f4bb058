// Type inference tests for qnn.softmax and the expressions around it

use qir::prelude::*;

// Helpers

fn params() -> [Expr; 4] {
    let input = QuantParams::new(0.1, 0);
    let output = QuantParams::new(1.0 / 256.0, -128);
    [
        input.scale_expr(),
        input.zero_point_expr(),
        output.scale_expr(),
        output.zero_point_expr(),
    ]
}

fn softmax_of(data: Expr, params: [Expr; 4]) -> Expr {
    let [s, z, os, oz] = params;
    qnn::softmax(data, -1, s, z, os, oz)
}

fn int8_data(dims: &[usize]) -> Expr {
    Expr::var("data", TensorType::new(dims, DType::I8))
}

// Accepting

#[test]
fn test_result_has_data_type() {
    let registry = OpRegistry::with_builtins().unwrap();
    let ctx = PassContext::new(&registry);
    let sm = softmax_of(int8_data(&[1, 4]), params());
    let typed = infer_types(&sm, &ctx).unwrap();
    assert_eq!(typed.checked_type(), &TensorType::new(&[1usize, 4][..], DType::I8));
    assert_eq!(typed.checked_type().to_string(), "Tensor[(1, 4), int8]");
}

#[test]
fn test_symbolic_and_dynamic_dims_pass_through() {
    let registry = OpRegistry::with_builtins().unwrap();
    let ctx = PassContext::new(&registry);
    let ty = TensorType::new(
        vec![SymDim::symbolic("Batch"), SymDim::Dynamic, SymDim::Fixed(10)],
        DType::I8,
    );
    let sm = softmax_of(Expr::var("data", ty.clone()), params());
    let typed = infer_types(&sm, &ctx).unwrap();
    assert_eq!(typed.checked_type(), &ty);
}

#[test]
fn test_parameter_types_recorded() {
    let registry = OpRegistry::with_builtins().unwrap();
    let ctx = PassContext::new(&registry);
    let p = params();
    let sm = softmax_of(int8_data(&[2, 3]), p.clone());
    let typed = infer_types(&sm, &ctx).unwrap();
    assert_eq!(typed.ty(&p[0]), Some(&TensorType::scalar(DType::F32)));
    assert_eq!(typed.ty(&p[1]), Some(&TensorType::scalar(DType::I32)));
    assert_eq!(typed.ty(&p[2]), Some(&TensorType::scalar(DType::F32)));
    assert_eq!(typed.ty(&p[3]), Some(&TensorType::scalar(DType::I32)));
}

#[test]
fn test_untyped_parameter_resolved_by_its_declaration_elsewhere() {
    let registry = OpRegistry::with_builtins().unwrap();
    let ctx = PassContext::new(&registry);
    let [_, z, os, oz] = params();
    let sm = qnn::softmax(int8_data(&[1, 4]), -1, Expr::untyped_var("s"), z, os, oz);
    let root = tensor::add(
        tensor::cast(sm, DType::F32),
        Expr::var("s", TensorType::scalar(DType::F32)),
    );
    let typed = infer_types(&root, &ctx).unwrap();
    assert_eq!(typed.checked_type(), &TensorType::new(&[1usize, 4][..], DType::F32));
}

// Rejecting

#[test]
fn test_non_int8_data_rejected() {
    let registry = OpRegistry::with_builtins().unwrap();
    let ctx = PassContext::new(&registry);
    for dtype in [DType::U8, DType::I16, DType::I32, DType::F32] {
        let data = Expr::var("data", TensorType::new(&[1usize, 4][..], dtype));
        let err = infer_types(&softmax_of(data, params()), &ctx).unwrap_err();
        assert!(
            matches!(err, Error::DTypeMismatch { expected: DType::I8, got } if got == dtype),
            "{dtype}: {err}"
        );
    }
}

#[test]
fn test_wrong_parameter_dtypes_rejected() {
    let registry = OpRegistry::with_builtins().unwrap();
    let ctx = PassContext::new(&registry);
    let cases: [(usize, Expr, &str); 4] = [
        (0, tensor::const_i32(1), "input_scale"),
        (1, tensor::const_f32(0.0), "input_zero_point"),
        (2, tensor::const_i64(1), "output_scale"),
        (3, tensor::const_i64(0), "output_zero_point"),
    ];
    for (slot, bad, name) in cases {
        let mut p = params();
        p[slot] = bad;
        let err = infer_types(&softmax_of(int8_data(&[1, 4]), p), &ctx).unwrap_err();
        assert!(
            matches!(err, Error::ScalarExpected { param, .. } if param == name),
            "{name}: {err}"
        );
    }
}

#[test]
fn test_non_scalar_parameter_rejected() {
    let registry = OpRegistry::with_builtins().unwrap();
    let ctx = PassContext::new(&registry);
    let mut p = params();
    p[0] = Expr::var("scales", TensorType::new(&[4usize][..], DType::F32));
    let err = infer_types(&softmax_of(int8_data(&[1, 4]), p), &ctx).unwrap_err();
    assert!(matches!(err, Error::ScalarExpected { param: "input_scale", .. }));
}

#[test]
fn test_unknown_parameter_type_is_unresolved() {
    let registry = OpRegistry::with_builtins().unwrap();
    let ctx = PassContext::new(&registry);
    let mut p = params();
    p[1] = Expr::untyped_var("zp");
    let err = infer_types(&softmax_of(int8_data(&[1, 4]), p), &ctx).unwrap_err();
    assert!(matches!(err, Error::Unresolved { op } if op == qnn::SOFTMAX));
}

#[test]
fn test_unknown_data_type_is_unresolved() {
    let registry = OpRegistry::with_builtins().unwrap();
    let ctx = PassContext::new(&registry);
    let err = infer_types(&softmax_of(Expr::untyped_var("data"), params()), &ctx).unwrap_err();
    assert!(matches!(err, Error::Unresolved { .. }));
}

#[test]
fn test_wrong_operand_count() {
    let registry = OpRegistry::with_builtins().unwrap();
    let ctx = PassContext::new(&registry);
    let [s, z, os, _] = params();
    let bad = Expr::call(
        qnn::SOFTMAX,
        vec![int8_data(&[1, 4]), s, z, os],
        Attrs::Softmax(SoftmaxAttrs::default()),
    );
    let err = infer_types(&bad, &ctx).unwrap_err();
    assert!(matches!(err, Error::ArityMismatch { expected: 5, got: 4, .. }));
}

#[test]
fn test_round_limit_respected() {
    let registry = OpRegistry::with_builtins().unwrap();
    let ctx = PassContext::new(&registry)
        .with_config(PassConfig::default().with_max_relation_rounds(0));
    let err = infer_types(&softmax_of(int8_data(&[1, 4]), params()), &ctx).unwrap_err();
    assert!(matches!(err, Error::Unresolved { .. }));
}

#[test]
fn test_bad_axis_caught_by_lowered_reductions() {
    let registry = OpRegistry::with_builtins().unwrap();
    let ctx = PassContext::new(&registry);
    let [s, z, os, oz] = params();
    let sm = qnn::softmax(int8_data(&[1, 4]), 2, s, z, os, oz);
    assert!(infer_types(&sm, &ctx).is_ok());
    let err = canonicalize(&sm, &ctx).unwrap_err();
    assert!(matches!(err, Error::DimOutOfRange { dim: 2, rank: 2 }));
}
