#[cfg(test)]
mod tests {
    use crate::symbolic::parse_expr::parse_formula;
    use crate::symbolic::symbolic_engine::{EvalError, Expr, Func, Notation, ParamMap, factorial};
    use crate::symbolic::symbolic_engine_derivatives::DiffError;
    use approx::assert_relative_eq;
    use strum::IntoEnumIterator;

    fn params(pairs: &[(&str, f64)]) -> ParamMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_eval_whitelisted_functions() {
        let empty = ParamMap::new();
        let formula = parse_formula("exp(x) + sin(x) * fac(4) - x ** 2 / 2").unwrap();
        for x in [-1.5, 0.0, 0.3, 2.0] {
            let expected = f64::exp(x) + f64::sin(x) * 24.0 - x.powi(2) / 2.0;
            assert_relative_eq!(formula.eval(x, &empty).unwrap(), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_algebraic_equivalence() {
        let empty = ParamMap::new();
        let factored = parse_formula("(x - 3) * (x + 2)").unwrap();
        let expanded = parse_formula("x**2 - x - 6").unwrap();
        let f = factored.lambdify();
        let g = expanded.lambdify();
        for x in -5..5 {
            let x = x as f64;
            assert_relative_eq!(f(x, &empty).unwrap(), g(x, &empty).unwrap());
        }
        for root in [3.0, -2.0] {
            assert_eq!(f(root, &empty).unwrap(), 0.0);
            assert_eq!(g(root, &empty).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_eval_with_parameters() {
        let formula = parse_formula(r#"p["k"] * (1 - exp(-x / p["t"]))"#).unwrap();
        let p = params(&[("k", 2.0), ("t", 0.5)]);
        assert_relative_eq!(
            formula.eval(1.0, &p).unwrap(),
            2.0 * (1.0 - f64::exp(-2.0)),
            epsilon = 1e-14
        );
        let missing = params(&[("k", 2.0)]);
        assert_eq!(
            formula.eval(1.0, &missing),
            Err(EvalError::MissingParameter("t".to_string()))
        );
    }

    #[test]
    fn test_factorial_domain() {
        let empty = ParamMap::new();
        let formula = parse_formula("fac(x)").unwrap();
        assert_eq!(formula.eval(5.0, &empty).unwrap(), 120.0);
        assert_eq!(formula.eval(0.0, &empty).unwrap(), 1.0);
        assert_eq!(
            formula.eval(2.5, &empty),
            Err(EvalError::FactorialDomain(2.5))
        );
        assert!(formula.eval(-1.0, &empty).is_err());
    }

    #[test]
    fn test_large_factorial_overflows_at_once() {
        assert!(factorial(170.0).unwrap().is_finite());
        assert_eq!(factorial(171.0).unwrap(), f64::INFINITY);
        assert_eq!(factorial(1e20).unwrap(), f64::INFINITY);
        let formula = parse_formula("fac(1e20) * x").unwrap();
        assert_eq!(formula.eval(1.0, &ParamMap::new()).unwrap(), f64::INFINITY);
        // folding keeps the call instead of an infinite constant
        assert_ne!(formula.expr().simplify_(), Expr::Const(f64::INFINITY));
    }

    #[test]
    fn test_bind_params() {
        let expr = Expr::parse_expression(r#"p["a"] * x + p["b"]"#).unwrap();
        let bound = expr.bind_params(&params(&[("a", 2.0), ("b", -1.0)])).unwrap();
        assert!(bound.params().is_empty());
        assert_eq!(bound.eval(3.0, &ParamMap::new()).unwrap(), 5.0);
        assert!(expr.bind_params(&params(&[("a", 2.0)])).is_err());
    }

    #[test]
    fn test_diff_polynomial() {
        let expr = Expr::parse_expression("x ** 3 - 2 * x").unwrap();
        let d1 = expr.diff_x().unwrap();
        let d2 = expr.n_th_derivative_x(2).unwrap();
        let empty = ParamMap::new();
        for x in [-2.0, 0.5, 3.0] {
            assert_relative_eq!(d1.eval(x, &empty).unwrap(), 3.0 * x * x - 2.0, epsilon = 1e-12);
            assert_relative_eq!(d2.eval(x, &empty).unwrap(), 6.0 * x, epsilon = 1e-12);
        }
        assert_eq!(expr.n_th_derivative_x(4).unwrap(), Expr::Const(0.0));
    }

    #[test]
    fn test_diff_functions() {
        let empty = ParamMap::new();
        let expr = Expr::parse_expression("sin(2 * x) * exp(-x)").unwrap();
        let d1 = expr.diff_x().unwrap();
        for x in [0.0, 0.7, 1.9] {
            let expected = 2.0 * f64::cos(2.0 * x) * f64::exp(-x) - f64::sin(2.0 * x) * f64::exp(-x);
            assert_relative_eq!(d1.eval(x, &empty).unwrap(), expected, epsilon = 1e-12);
        }
        let quotient = Expr::parse_expression("1 / (1 + x ** 2)").unwrap();
        let dq = quotient.diff_x().unwrap();
        assert_relative_eq!(dq.eval(1.0, &empty).unwrap(), -0.5, epsilon = 1e-12);
        // x^x = exp(x ln x), derivative x^x (ln x + 1)
        let general = Expr::parse_expression("x ** x").unwrap();
        let dg = general.diff_x().unwrap();
        assert_relative_eq!(
            dg.eval(2.0, &empty).unwrap(),
            4.0 * (f64::ln(2.0) + 1.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_diff_with_respect_to_parameter() {
        let expr = Expr::parse_expression(r#"p["k"] * (1 - exp(-x / p["t"]))"#).unwrap();
        let p = params(&[("k", 2.0), ("t", 0.5)]);
        let dk = expr.diff_param("k").unwrap();
        let dt = expr.diff_param("t").unwrap();
        let x = 0.8;
        assert_relative_eq!(
            dk.eval(x, &p).unwrap(),
            1.0 - f64::exp(-x / 0.5),
            epsilon = 1e-12
        );
        // d/dt k(1 - e^(-x/t)) = -k x e^(-x/t) / t^2
        assert_relative_eq!(
            dt.eval(x, &p).unwrap(),
            -2.0 * x * f64::exp(-x / 0.5) / 0.25,
            epsilon = 1e-12
        );
        assert_eq!(expr.diff_param("missing").unwrap(), Expr::Const(0.0));
    }

    #[test]
    fn test_factorial_is_not_differentiable() {
        let expr = Expr::parse_expression("fac(x) + x").unwrap();
        assert_eq!(
            expr.diff_x(),
            Err(DiffError::NonDifferentiable("x".to_string()))
        );
        // a factorial of a constant is a constant
        let expr = Expr::parse_expression("fac(3) * x").unwrap();
        assert_eq!(expr.diff_x().unwrap(), Expr::Const(6.0));
    }

    #[test]
    fn test_derivative_rendering() {
        let expr = Expr::parse_expression("exp(2 * x)").unwrap();
        assert_eq!(expr.diff_x().unwrap().to_string(), "e^2 · x · 2");
        let expr = Expr::parse_expression("sin(x)").unwrap();
        assert_eq!(expr.diff_x().unwrap().render(Notation::Plain), "cos(x)");
        assert_eq!(expr.diff_x().unwrap().render(Notation::Latex), "$\\cos{x}$");
    }

    #[test]
    fn test_every_function_evaluates() {
        let empty = ParamMap::new();
        for func in Func::iter() {
            let expr = Expr::call(func, Expr::Const(1.0));
            assert!(expr.eval(0.0, &empty).unwrap().is_finite(), "{}", func);
        }
    }
}
