use super::*;
use crate::messages::NESSUNA_MODIFICA;
use crate::orders::{OrderItemDto, OrderItemRepository};
use crate::repository::same_amount;
use crate::test_support::TestDb;
use rust_decimal_macros::dec;

fn dolce_dto(nome: &str, prezzo: f64, priorita: i32) -> DolceDto {
    DolceDto {
        nome: nome.to_string(),
        prezzo,
        descrizione: Some("Fatto in casa".to_string()),
        immagine_url: None,
        disponibile: true,
        priorita,
    }
}

fn bevanda_dto(personalizzazione_id: i64, dimensione_bicchiere_id: i64) -> BevandaStandardDto {
    BevandaStandardDto {
        personalizzazione_id,
        dimensione_bicchiere_id,
        prezzo: 4.5,
        immagine_url: Some("https://shop.test/taro.png".to_string()),
        disponibile: true,
        sempre_disponibile: false,
        priorita: 5,
    }
}

fn riga_ordine(ordine_id: i64, articolo_id: i64, tax_rate_id: i64) -> OrderItemDto {
    OrderItemDto {
        ordine_id,
        articolo_id,
        quantita: 1,
        prezzo_unitario: 4.5,
        sconto_applicato: 0.0,
        tax_rate_id,
    }
}

async fn totale_ordine(db: &TestDb, ordine_id: i64) -> f64 {
    sqlx::query_scalar("SELECT totale FROM ordine WHERE ordine_id = ?")
        .bind(ordine_id)
        .fetch_one(&db.pool)
        .await
        .expect("ordine row")
}

async fn tipo_of(db: &TestDb, articolo_id: i64) -> String {
    sqlx::query_scalar("SELECT tipo FROM articolo WHERE articolo_id = ?")
        .bind(articolo_id)
        .fetch_one(&db.pool)
        .await
        .expect("articolo row")
}

#[tokio::test]
async fn test_add_dolce_creates_articolo_with_tag() {
    let db = TestDb::new().await;
    let repo = DolceRepository::new(db.pool.clone());

    let result = repo.add(dolce_dto("  Tiramisù  ", 4.0, 3)).await.unwrap();
    assert!(result.success, "{}", result.message);
    assert_eq!(result.message, "Dolce creato con successo");

    let dolce = result.data.unwrap();
    assert_eq!(dolce.nome, "Tiramisù");
    assert_eq!(tipo_of(&db, dolce.articolo_id).await, "D");

    let articolo = ArticoloRepository::new(db.pool.clone())
        .get_by_id(dolce.articolo_id)
        .await
        .unwrap();
    assert_eq!(articolo.data.unwrap().tipo, TipoArticolo::Dolce);
}

#[tokio::test]
async fn test_add_dolce_duplicate_name_persists_nothing() {
    let db = TestDb::new().await;
    let repo = DolceRepository::new(db.pool.clone());

    assert!(repo.add(dolce_dto("Cheesecake", 4.0, 1)).await.unwrap().success);
    let duplicate = repo.add(dolce_dto("  CHEESECAKE ", 5.0, 2)).await.unwrap();

    assert!(!duplicate.success);
    assert!(duplicate.message.contains("Esiste già"));
    assert_eq!(db.count("dolce").await, 1);
    assert_eq!(db.count("articolo").await, 1);
}

#[tokio::test]
async fn test_add_dolce_accented_name_is_case_insensitive_unique() {
    let db = TestDb::new().await;
    let repo = DolceRepository::new(db.pool.clone());

    assert!(repo.add(dolce_dto("Babà", 3.0, 1)).await.unwrap().success);
    let duplicate = repo.add(dolce_dto("  BABÀ  ", 3.5, 1)).await.unwrap();
    assert!(!duplicate.success);
    assert!(duplicate.message.contains("Esiste già"));
    assert_eq!(db.count("dolce").await, 1);
    assert_eq!(db.count("articolo").await, 1);

    let found = repo.get_by_nome("babÀ").await.unwrap();
    assert!(found.success, "{}", found.message);
    assert_eq!(found.data.unwrap().nome, "Babà");
}

#[tokio::test]
async fn test_add_dolce_rejects_non_finite_price() {
    let db = TestDb::new().await;
    let repo = DolceRepository::new(db.pool.clone());

    let result = repo.add(dolce_dto("Zeppola", f64::NAN, 1)).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.message, "Prezzo non valido");
    assert_eq!(db.count("articolo").await, 0);
}

#[tokio::test]
async fn test_add_dolce_rejects_unsafe_description() {
    let db = TestDb::new().await;
    let repo = DolceRepository::new(db.pool.clone());

    let mut dto = dolce_dto("Panna cotta", 3.5, 1);
    dto.descrizione = Some("<script>alert(1)</script>".to_string());
    let result = repo.add(dto).await.unwrap();

    assert!(!result.success);
    assert_eq!(db.count("articolo").await, 0);
}

#[tokio::test]
async fn test_update_dolce_noop_and_change() {
    let db = TestDb::new().await;
    let repo = DolceRepository::new(db.pool.clone());
    let id = repo
        .add(dolce_dto("Brownie", 3.0, 2))
        .await
        .unwrap()
        .data
        .unwrap()
        .articolo_id;

    let noop = repo.update(id, dolce_dto(" Brownie ", 3.0, 2)).await.unwrap();
    assert!(noop.success);
    assert_eq!(noop.data, Some(false));
    assert_eq!(noop.message, NESSUNA_MODIFICA);

    let changed = repo.update(id, dolce_dto("Brownie", 3.5, 2)).await.unwrap();
    assert!(changed.success);
    assert_eq!(changed.data, Some(true));
    assert_eq!(changed.message, "Dolce aggiornato con successo");

    let missing = repo.update(999, dolce_dto("Brownie", 3.5, 2)).await.unwrap();
    assert!(!missing.success);
}

#[tokio::test]
async fn test_update_dolce_to_taken_name_conflicts() {
    let db = TestDb::new().await;
    let repo = DolceRepository::new(db.pool.clone());
    repo.add(dolce_dto("Cannolo", 2.5, 1)).await.unwrap();
    let id = repo
        .add(dolce_dto("Sfogliatella", 2.5, 1))
        .await
        .unwrap()
        .data
        .unwrap()
        .articolo_id;

    let result = repo.update(id, dolce_dto("cannolo", 2.5, 1)).await.unwrap();
    assert!(!result.success);
    assert!(result.message.contains("cannolo"));
}

#[tokio::test]
async fn test_dolci_sorted_and_page_clamped() {
    let db = TestDb::new().await;
    let repo = DolceRepository::new(db.pool.clone());
    repo.add(dolce_dto("babà", 3.0, 2)).await.unwrap();
    repo.add(dolce_dto("Zeppola", 3.0, 9)).await.unwrap();
    repo.add(dolce_dto("Amaretto", 3.0, 2)).await.unwrap();

    let page = repo.get_all(0, 0).await.unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.page_size, 1);
    assert_eq!(page.total_count, 3);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.data[0].nome, "Zeppola");

    let all = repo.get_all(1, 10).await.unwrap();
    let nomi: Vec<_> = all.data.iter().map(|d| d.nome.as_str()).collect();
    assert_eq!(nomi, vec!["Zeppola", "Amaretto", "babà"]);

    let beyond = repo.get_all(5, 10).await.unwrap();
    assert!(beyond.data.is_empty());
    assert_eq!(beyond.total_count, 3);
}

#[tokio::test]
async fn test_delete_dolce_with_favourites_requires_force() {
    let db = TestDb::new().await;
    let repo = DolceRepository::new(db.pool.clone());
    let id = db.dolce("Crostata", 3.0).await;
    let cliente = db.cliente_pronto().await;
    db.preferito(cliente, id).await;

    let rejected = repo.delete(id, false).await.unwrap();
    assert!(!rejected.success);
    assert!(rejected.message.contains("force_delete"));
    assert_eq!(db.count("dolce").await, 1);

    let forced = repo.delete(id, true).await.unwrap();
    assert!(forced.success);
    assert_eq!(forced.data, Some(true));
    assert_eq!(db.count("preferiti_cliente").await, 0);
    assert_eq!(db.count("dolce").await, 0);
    assert_eq!(db.count("articolo").await, 0);
}

#[tokio::test]
async fn test_delete_dolce_invalid_and_missing_id() {
    let db = TestDb::new().await;
    let repo = DolceRepository::new(db.pool.clone());

    assert!(!repo.delete(0, false).await.unwrap().success);
    assert!(!repo.delete(42, false).await.unwrap().success);

    let exists = repo.exists(42).await.unwrap();
    assert!(exists.success);
    assert_eq!(exists.data, Some(false));
}

#[tokio::test]
async fn test_bevanda_standard_lifecycle_and_price() {
    let db = TestDb::new().await;
    let unita = db.unita("ml").await;
    let dimensione = db.dimensione("L", unita, 3.5, 1.5).await;
    let ricetta = db.personalizzazione("Taro Milk").await;
    let repo = BevandaStandardRepository::new(db.pool.clone());

    let created = repo.add(bevanda_dto(ricetta, dimensione)).await.unwrap();
    assert!(created.success, "{}", created.message);
    let id = created.data.unwrap().articolo_id;
    assert_eq!(tipo_of(&db, id).await, "BS");

    let duplicate = repo.add(bevanda_dto(ricetta, dimensione)).await.unwrap();
    assert!(!duplicate.success);
    assert_eq!(db.count("articolo").await, 1);

    let listino = repo.calcola_prezzo_listino(id).await.unwrap().data.unwrap();
    assert_eq!(listino.prezzo_calcolato, dec!(5.25));

    let deleted = repo.delete(id, false).await.unwrap();
    assert!(deleted.success);
    assert_eq!(db.count("articolo").await, 0);
}

#[tokio::test]
async fn test_bevanda_standard_unknown_reference() {
    let db = TestDb::new().await;
    let ricetta = db.personalizzazione("Matcha").await;
    let repo = BevandaStandardRepository::new(db.pool.clone());

    let result = repo.add(bevanda_dto(ricetta, 77)).await.unwrap();
    assert!(!result.success);
    assert!(result.message.contains("77"));
    assert_eq!(db.count("articolo").await, 0);
}

#[tokio::test]
async fn test_bevanda_standard_disponibili_include_sempre_disponibile() {
    let db = TestDb::new().await;
    let unita = db.unita("ml").await;
    let m = db.dimensione("M", unita, 3.0, 1.0).await;
    let l = db.dimensione("L", unita, 3.0, 1.2).await;
    let xl = db.dimensione("XL", unita, 3.0, 1.4).await;
    let ricetta = db.personalizzazione("Brown Sugar").await;
    let repo = BevandaStandardRepository::new(db.pool.clone());

    repo.add(bevanda_dto(ricetta, m)).await.unwrap();
    let mut fuori = bevanda_dto(ricetta, l);
    fuori.disponibile = false;
    repo.add(fuori).await.unwrap();
    let mut sempre = bevanda_dto(ricetta, xl);
    sempre.disponibile = false;
    sempre.sempre_disponibile = true;
    repo.add(sempre).await.unwrap();

    let disponibili = repo.get_disponibili(1, 10).await.unwrap();
    assert_eq!(disponibili.total_count, 2);
    assert_eq!(repo.count_disponibili().await.unwrap().data, Some(2));
    assert_eq!(repo.get_by_personalizzazione(ricetta, 1, 10).await.unwrap().total_count, 3);
}

#[tokio::test]
async fn test_bevanda_custom_price_adds_surcharges() {
    let db = TestDb::new().await;
    let unita = db.unita("ml").await;
    let dimensione = db.dimensione("L", unita, 4.0, 1.25).await;
    let ricetta = db.personalizzazione_custom("La mia", dimensione).await;
    let perle = db.ingrediente("Perle di tapioca", 0.5).await;
    let cocco = db.ingrediente("Gelatina al cocco", 0.3).await;
    db.ingrediente_selezionato(ricetta, perle).await;
    db.ingrediente_selezionato(ricetta, cocco).await;
    let repo = BevandaCustomRepository::new(db.pool.clone());

    let created = repo
        .add(BevandaCustomDto {
            pers_custom_id: ricetta,
            prezzo: 5.8,
        })
        .await
        .unwrap();
    assert!(created.success, "{}", created.message);
    let id = created.data.unwrap().articolo_id;
    assert_eq!(tipo_of(&db, id).await, "BC");

    let prezzo = repo.calcola_prezzo(id).await.unwrap();
    assert_eq!(prezzo.data, Some(dec!(5.80)));

    let second = repo
        .add(BevandaCustomDto {
            pers_custom_id: ricetta,
            prezzo: 6.0,
        })
        .await
        .unwrap();
    assert!(!second.success);
}

#[tokio::test]
async fn test_personalizzazione_custom_forced_delete_removes_bevanda() {
    let db = TestDb::new().await;
    let unita = db.unita("ml").await;
    let dimensione = db.dimensione("M", unita, 3.0, 1.0).await;
    let ricetta = db.personalizzazione_custom("Sola", dimensione).await;
    let perle = db.ingrediente("Perle di tapioca", 0.5).await;
    db.ingrediente_selezionato(ricetta, perle).await;
    let bevanda = BevandaCustomRepository::new(db.pool.clone())
        .add(BevandaCustomDto {
            pers_custom_id: ricetta,
            prezzo: 3.5,
        })
        .await
        .unwrap();
    assert!(bevanda.success, "{}", bevanda.message);
    let cliente = db.cliente_pronto().await;
    db.preferito(cliente, bevanda.data.unwrap().articolo_id).await;
    let repo = PersonalizzazioneCustomRepository::new(db.pool.clone());

    let refused = repo.delete(ricetta, false).await.unwrap();
    assert!(!refused.success);
    assert!(refused.message.contains("bevande custom: 1"));
    assert_eq!(db.count("bevanda_custom").await, 1);

    let forced = repo.delete(ricetta, true).await.unwrap();
    assert!(forced.success, "{}", forced.message);
    assert_eq!(db.count("personalizzazione_custom").await, 0);
    assert_eq!(db.count("bevanda_custom").await, 0);
    assert_eq!(db.count("articolo").await, 0);
    assert_eq!(db.count("ingredienti_personalizzazione").await, 0);
    assert_eq!(db.count("preferiti_cliente").await, 0);
    assert_eq!(db.count("ingrediente").await, 1);
}

#[tokio::test]
async fn test_delete_dolce_with_order_lines_recomputes_total() {
    let db = TestDb::seeded().await;
    let dolce = db.dolce("Cannolo", 4.5).await;
    let cliente = db.cliente_pronto().await;
    let bozza = db.stato_ordine_id("bozza").await;
    let non_pagato = db.stato_pagamento_id("non_pagato").await;
    let ordine = db.ordine(cliente, bozza, non_pagato).await;
    let iva = db.tax_rate(22.0, "Ordinaria").await;
    let riga = OrderItemRepository::new(db.pool.clone())
        .add(riga_ordine(ordine, dolce, iva))
        .await
        .unwrap();
    assert!(riga.success, "{}", riga.message);
    let repo = DolceRepository::new(db.pool.clone());

    let refused = repo.delete(dolce, false).await.unwrap();
    assert!(!refused.success);
    assert!(refused.message.contains("righe d'ordine: 1"));

    let forced = repo.delete(dolce, true).await.unwrap();
    assert!(forced.success, "{}", forced.message);
    assert_eq!(db.count("order_item").await, 0);
    assert_eq!(db.count("articolo").await, 0);
    assert!(same_amount(totale_ordine(&db, ordine).await, 0.0));
}

#[tokio::test]
async fn test_articolo_get_by_tipo() {
    let db = TestDb::new().await;
    db.dolce("Cannolo", 2.0).await;
    db.dolce("Sfogliatella", 2.0).await;
    let repo = ArticoloRepository::new(db.pool.clone());

    let dolci = repo.get_by_tipo("d", 1, 10).await.unwrap();
    assert_eq!(dolci.total_count, 2);
    assert!(dolci.data.iter().all(|a| a.tipo == TipoArticolo::Dolce));

    let bevande = repo.get_by_tipo("BS", 1, 10).await.unwrap();
    assert_eq!(bevande.total_count, 0);

    let invalid = repo.get_by_tipo("XX", 1, 10).await.unwrap();
    assert!(invalid.data.is_empty());
    assert!(invalid.message.unwrap().contains("non valido"));
}

#[tokio::test]
async fn test_forced_delete_removes_size_quantities() {
    let db = TestDb::new().await;
    let unita = db.unita("g").await;
    let dimensione = db.dimensione("M", unita, 3.0, 1.0).await;
    let ricetta = db.personalizzazione("Classica").await;
    let ingrediente = db.ingrediente("Tè nero", 0.0).await;
    let riga = db.personalizzazione_ingrediente(ricetta, ingrediente, 100.0, unita).await;
    db.dimensione_quantita(riga, dimensione, 1.5).await;
    let repo = PersonalizzazioneIngredienteRepository::new(db.pool.clone());

    let rejected = repo.delete(riga, false).await.unwrap();
    assert!(!rejected.success);
    assert!(rejected.message.contains("quantità per dimensione: 1"));

    let forced = repo.delete(riga, true).await.unwrap();
    assert!(forced.success);
    assert_eq!(db.count("dimensione_quantita_ingredienti").await, 0);
    assert_eq!(db.count("personalizzazione_ingrediente").await, 0);
}

#[tokio::test]
async fn test_quantita_per_dimensione_scaled_and_fallback() {
    let db = TestDb::new().await;
    let unita = db.unita("g").await;
    let m = db.dimensione("M", unita, 3.0, 1.0).await;
    let l = db.dimensione("L", unita, 3.0, 1.5).await;
    let ricetta = db.personalizzazione("Classica").await;
    let ingrediente = db.ingrediente("Zucchero di canna", 0.0).await;
    let riga = db.personalizzazione_ingrediente(ricetta, ingrediente, 100.0, unita).await;
    db.dimensione_quantita(riga, l, 1.5).await;
    let repo = PersonalizzazioneIngredienteRepository::new(db.pool.clone());

    let scalata = repo.get_quantita_per_dimensione(riga, l).await.unwrap().data.unwrap();
    assert_eq!(scalata.quantita.quantita, dec!(150));
    assert!(!scalata.quantita.is_fallback());

    let base = repo.get_quantita_per_dimensione(riga, m).await.unwrap().data.unwrap();
    assert_eq!(base.quantita.quantita, dec!(100));
    assert!(base.quantita.is_fallback());

    let unknown = repo.get_quantita_per_dimensione(riga, 999).await.unwrap();
    assert!(!unknown.success);
}

#[tokio::test]
async fn test_unita_forced_delete_reaches_drinks() {
    let db = TestDb::seeded().await;
    let unita = db.unita("ml").await;
    let dimensione = db.dimensione("S", unita, 2.5, 0.8).await;
    let ricetta = db.personalizzazione("Taro Milk").await;
    let ingrediente = db.ingrediente("Taro", 0.0).await;
    let dose = db.personalizzazione_ingrediente(ricetta, ingrediente, 30.0, unita).await;
    db.dimensione_quantita(dose, dimensione, 0.8).await;
    let bevanda = BevandaStandardRepository::new(db.pool.clone())
        .add(bevanda_dto(ricetta, dimensione))
        .await
        .unwrap();
    assert!(bevanda.success, "{}", bevanda.message);
    let articolo_id = bevanda.data.unwrap().articolo_id;

    let cliente = db.cliente_pronto().await;
    let bozza = db.stato_ordine_id("bozza").await;
    let non_pagato = db.stato_pagamento_id("non_pagato").await;
    let ordine = db.ordine(cliente, bozza, non_pagato).await;
    let iva = db.tax_rate(22.0, "Ordinaria").await;
    OrderItemRepository::new(db.pool.clone())
        .add(riga_ordine(ordine, articolo_id, iva))
        .await
        .unwrap();
    assert!(same_amount(totale_ordine(&db, ordine).await, 5.49));
    let repo = UnitaDiMisuraRepository::new(db.pool.clone());

    let refused = repo.delete(unita, false).await.unwrap();
    assert!(!refused.success);
    assert!(refused.message.contains("dimensioni bicchiere: 1"));
    assert!(refused.message.contains("ingredienti di personalizzazione: 1"));
    assert_eq!(db.count("unita_di_misura").await, 1);

    let forced = repo.delete(unita, true).await.unwrap();
    assert!(forced.success, "{}", forced.message);
    assert_eq!(db.count("unita_di_misura").await, 0);
    assert_eq!(db.count("dimensione_bicchiere").await, 0);
    assert_eq!(db.count("bevanda_standard").await, 0);
    assert_eq!(db.count("articolo").await, 0);
    assert_eq!(db.count("personalizzazione_ingrediente").await, 0);
    assert_eq!(db.count("dimensione_quantita_ingredienti").await, 0);
    assert_eq!(db.count("order_item").await, 0);
    assert_eq!(db.count("personalizzazione").await, 1);
    assert_eq!(db.count("ordine").await, 1);
    assert!(same_amount(totale_ordine(&db, ordine).await, 0.0));
}

#[tokio::test]
async fn test_unita_sigla_case_insensitive_unique() {
    let db = TestDb::new().await;
    let repo = UnitaDiMisuraRepository::new(db.pool.clone());

    let first = repo
        .add(UnitaDiMisuraDto {
            sigla: "ml".to_string(),
            descrizione: "millilitri".to_string(),
        })
        .await
        .unwrap();
    assert!(first.success);

    let second = repo
        .add(UnitaDiMisuraDto {
            sigla: " ML ".to_string(),
            descrizione: "ancora millilitri".to_string(),
        })
        .await
        .unwrap();
    assert!(!second.success);

    let taken = repo.exists_by_sigla("Ml", None).await.unwrap();
    assert_eq!(taken.data, Some(true));
}

#[tokio::test]
async fn test_ingredienti_selezionati_pair_unique() {
    let db = TestDb::new().await;
    let unita = db.unita("ml").await;
    let dimensione = db.dimensione("M", unita, 3.0, 1.0).await;
    let ricetta = db.personalizzazione_custom("Mia", dimensione).await;
    let perle = db.ingrediente("Perle", 0.5).await;
    let repo = IngredientiPersonalizzazioneRepository::new(db.pool.clone());
    let dto = IngredientiPersonalizzazioneDto {
        pers_custom_id: ricetta,
        ingrediente_id: perle,
    };

    assert!(repo.add(dto.clone()).await.unwrap().success);
    assert!(!repo.add(dto).await.unwrap().success);

    let page = repo.get_by_personalizzazione_custom(ricetta, 1, 10).await.unwrap();
    assert_eq!(page.total_count, 1);
}
