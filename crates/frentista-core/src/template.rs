//! Message template rendering with `{placeholder}` substitution.
//! Pure function, shared by the campaign dispatcher and the
//! conversation engine.

pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_placeholder() {
        assert_eq!(
            render("Olá {name}, tudo bem?", &[("name", "Maria")]),
            "Olá Maria, tudo bem?"
        );
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        assert_eq!(render("Oi {other}", &[("name", "Maria")]), "Oi {other}");
    }

    #[test]
    fn test_empty_value() {
        assert_eq!(render("Olá {name}!", &[("name", "")]), "Olá !");
    }

    #[test]
    fn test_repeated_placeholder() {
        assert_eq!(
            render("{name}, {name}!", &[("name", "Zé")]),
            "Zé, Zé!"
        );
    }
}
