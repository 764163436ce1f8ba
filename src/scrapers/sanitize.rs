/// Normalize a raw text token scraped from markup: trim the ends and
/// collapse embedded runs of spaces, tabs, newlines and carriage returns
/// to a single space. Accented characters and punctuation such as the
/// middle dot in French labels pass through untouched.
pub fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_space = false;
    for ch in raw.chars() {
        if matches!(ch, ' ' | '\t' | '\n' | '\r') {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_embedded_whitespace() {
        assert_eq!(clean_text("  Nombre\n\t de   vues \n"), "Nombre de vues");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text(" \n\t "), "");
    }

    #[test]
    fn preserves_accents_and_middle_dots() {
        assert_eq!(clean_text(" Intéressés·ées "), "Intéressés·ées");
        assert_eq!(clean_text("Ajouté"), "Ajouté");
    }
}
