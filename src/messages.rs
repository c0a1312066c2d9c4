// User-facing messages
// A small fixed Italian vocabulary shared by every repository envelope

/// Grammatical gender drives the participle agreement ("creato" / "creata")
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Genere {
    Maschile,
    Femminile,
}

/// Display label of an entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    /// Capitalized singular, e.g. "Dolce"
    pub nome: &'static str,
    /// Singular with indefinite article, e.g. "un dolce"
    pub indeterminativo: &'static str,
    pub genere: Genere,
}

impl Label {
    pub const fn maschile(nome: &'static str, indeterminativo: &'static str) -> Self {
        Self {
            nome,
            indeterminativo,
            genere: Genere::Maschile,
        }
    }

    pub const fn femminile(nome: &'static str, indeterminativo: &'static str) -> Self {
        Self {
            nome,
            indeterminativo,
            genere: Genere::Femminile,
        }
    }

    fn participio(&self, radice: &str) -> String {
        match self.genere {
            Genere::Maschile => format!("{radice}o"),
            Genere::Femminile => format!("{radice}a"),
        }
    }
}

pub const NESSUNA_MODIFICA: &str = "Nessuna modifica necessaria";

pub fn creato(label: Label) -> String {
    format!("{} {} con successo", label.nome, label.participio("creat"))
}

pub fn aggiornato(label: Label) -> String {
    format!("{} {} con successo", label.nome, label.participio("aggiornat"))
}

pub fn eliminato(label: Label) -> String {
    format!("{} {} con successo", label.nome, label.participio("eliminat"))
}

pub fn trovato(label: Label) -> String {
    format!("{} {}", label.nome, label.participio("trovat"))
}

pub fn non_trovato(label: Label, id: i64) -> String {
    format!("{} con ID {} non {}", label.nome, id, label.participio("trovat"))
}

pub fn non_trovato_per(label: Label, chiave: &str) -> String {
    format!("{} con {} non {}", label.nome, chiave, label.participio("trovat"))
}

pub fn esiste_gia(label: Label, chiave: &str) -> String {
    format!("Esiste già {} con {}", label.indeterminativo, chiave)
}

pub fn dipendenze_presenti(label: Label, dettaglio: &str) -> String {
    format!(
        "Impossibile eliminare {}: esistono dipendenze ({}). Usa force_delete per eliminarle",
        label.indeterminativo, dettaglio
    )
}

pub fn esistenza(label: Label, esiste: bool) -> String {
    if esiste {
        format!("{} esistente", label.nome)
    } else {
        format!("{} non {}", label.nome, label.participio("trovat"))
    }
}

pub fn elenco(totale: i64) -> String {
    match totale {
        0 => "Nessun elemento trovato".to_string(),
        1 => "Trovato 1 elemento".to_string(),
        n => format!("Trovati {n} elementi"),
    }
}

pub fn conteggio(totale: i64) -> String {
    format!("Conteggio completato: {totale}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOLCE: Label = Label::maschile("Dolce", "un dolce");
    const TAX: Label = Label::femminile("Aliquota", "un'aliquota");

    #[test]
    fn test_participle_agreement() {
        assert_eq!(creato(DOLCE), "Dolce creato con successo");
        assert_eq!(creato(TAX), "Aliquota creata con successo");
        assert_eq!(aggiornato(TAX), "Aliquota aggiornata con successo");
        assert_eq!(eliminato(DOLCE), "Dolce eliminato con successo");
    }

    #[test]
    fn test_not_found_and_conflict() {
        assert_eq!(non_trovato(DOLCE, 5), "Dolce con ID 5 non trovato");
        assert_eq!(
            esiste_gia(DOLCE, "nome 'Tiramisù'"),
            "Esiste già un dolce con nome 'Tiramisù'"
        );
    }

    #[test]
    fn test_dependency_message_has_no_gendered_participle() {
        const CUSTOM: Label = Label::femminile("Personalizzazione custom", "una personalizzazione custom");
        let message = dipendenze_presenti(CUSTOM, "bevande custom: 1");
        assert_eq!(
            message,
            "Impossibile eliminare una personalizzazione custom: esistono dipendenze \
             (bevande custom: 1). Usa force_delete per eliminarle"
        );
        assert!(!message.contains("referenziat"));
    }

    #[test]
    fn test_existence_message() {
        assert_eq!(esistenza(DOLCE, true), "Dolce esistente");
        assert_eq!(esistenza(TAX, true), "Aliquota esistente");
        assert_eq!(esistenza(TAX, false), "Aliquota non trovata");
    }

    #[test]
    fn test_list_message() {
        assert_eq!(elenco(0), "Nessun elemento trovato");
        assert_eq!(elenco(1), "Trovato 1 elemento");
        assert_eq!(elenco(4), "Trovati 4 elementi");
    }
}
