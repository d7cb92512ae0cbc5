//! End-to-end conversation flows over generated PDFs with local stand-ins
//! for the embedding and generation services.

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdf_chat_core::{
    extract_text, CharacterNgramEmbedder, ChatError, ChatOrchestrator, GenerationRequest,
    GenerationService, IngestError, Role, SourceDocument,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct ScriptedGenerator {
    fail: AtomicBool,
    requests: Mutex<Vec<GenerationRequest>>,
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ChatError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChatError::generation("scripted", "503 Service Unavailable"));
        }
        self.requests.lock().unwrap().push(request.clone());
        Ok(format!("A: {}", request.question))
    }
}

fn pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn greek_letters() -> SourceDocument {
    SourceDocument::new("greek.pdf", pdf(&["Alpha beta gamma.", "Delta epsilon."]))
}

fn orchestrator(
    generator: Arc<ScriptedGenerator>,
) -> ChatOrchestrator<CharacterNgramEmbedder, ScriptedGenerator> {
    ChatOrchestrator::new(Arc::new(CharacterNgramEmbedder::default()), generator)
}

#[tokio::test]
async fn short_document_becomes_a_single_chunk() {
    let mut chat = orchestrator(Arc::new(ScriptedGenerator::default()));

    let text = extract_text(&[greek_letters()]).unwrap();
    assert_eq!(text, "Alpha beta gamma.\nDelta epsilon.");

    let report = chat.process_documents(&[greek_letters()]).await.unwrap();

    assert_eq!(report.document_count, 1);
    assert_eq!(report.text_chars, 32);
    assert_eq!(report.chunk_count, 1);
    assert!(chat.is_ready());

    let index = chat.session().index().unwrap();
    let hits = index.query("gamma", 4).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.text, text);
    assert_eq!(hits[0].chunk.start_char, 0);
}

#[tokio::test]
async fn first_answer_is_the_whole_history() {
    let generator = Arc::new(ScriptedGenerator::default());
    let mut chat = orchestrator(generator.clone());
    chat.process_documents(&[greek_letters()]).await.unwrap();

    let turn = chat.ask("What is gamma?").await.unwrap();

    assert_eq!(turn.question, "What is gamma?");
    assert_eq!(chat.history(), vec![&turn]);

    let requests = generator.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].context[0].contains("gamma"));
    assert!(requests[0].history.is_empty());
}

#[tokio::test]
async fn history_is_rendered_most_recent_first() {
    let generator = Arc::new(ScriptedGenerator::default());
    let mut chat = orchestrator(generator.clone());
    chat.process_documents(&[greek_letters()]).await.unwrap();

    chat.ask("Q1").await.unwrap();
    chat.ask("Q2").await.unwrap();

    let history = chat.history();
    let questions: Vec<&str> = history.iter().map(|turn| turn.question.as_str()).collect();
    assert_eq!(questions, vec!["Q2", "Q1"]);
    assert_eq!(history[0].answer, "A: Q2");

    let requests = generator.requests.lock().unwrap();
    let second = &requests[1].history;
    assert_eq!(second.len(), 2);
    assert_eq!(second[0].role, Role::User);
    assert_eq!(second[0].content, "Q1");
    assert_eq!(second[1].role, Role::Assistant);
    assert_eq!(second[1].content, "A: Q1");
}

#[tokio::test]
async fn asking_before_processing_changes_nothing() {
    let mut chat = orchestrator(Arc::new(ScriptedGenerator::default()));

    let result = chat.ask("What is gamma?").await;

    assert!(matches!(result, Err(ChatError::NotReady(_))));
    assert!(chat.history().is_empty());
    assert!(!chat.is_ready());
}

#[tokio::test]
async fn generation_failure_keeps_history_length() {
    let generator = Arc::new(ScriptedGenerator::default());
    let mut chat = orchestrator(generator.clone());
    chat.process_documents(&[greek_letters()]).await.unwrap();
    chat.ask("Q1").await.unwrap();

    generator.fail.store(true, Ordering::SeqCst);
    let before = chat.history().len();
    let result = chat.ask("Q2").await;

    assert!(matches!(result, Err(ChatError::GenerationService { .. })));
    assert_eq!(chat.history().len(), before);

    generator.fail.store(false, Ordering::SeqCst);
    chat.ask("Q3").await.unwrap();
    assert_eq!(chat.history().len(), before + 1);
}

#[tokio::test]
async fn rebuild_replaces_the_index_and_keeps_history() {
    let generator = Arc::new(ScriptedGenerator::default());
    let mut chat = orchestrator(generator.clone());
    chat.process_documents(&[greek_letters()]).await.unwrap();
    chat.ask("What is gamma?").await.unwrap();

    let pumps = SourceDocument::new("pumps.pdf", pdf(&["Hydraulic pump maintenance."]));
    chat.process_documents(&[pumps]).await.unwrap();
    chat.ask("How are pumps maintained?").await.unwrap();

    assert_eq!(chat.history().len(), 2);
    let requests = generator.requests.lock().unwrap();
    assert!(requests[1].context.iter().all(|text| !text.contains("gamma")));
    assert!(requests[1].context[0].contains("pump"));
}

#[tokio::test]
async fn corrupt_upload_fails_the_whole_batch() {
    let mut chat = orchestrator(Arc::new(ScriptedGenerator::default()));
    let broken = SourceDocument::new("broken.pdf", b"%PDF-1.4\n%broken".to_vec());

    let result = chat.process_documents(&[greek_letters(), broken]).await;

    assert!(matches!(
        result,
        Err(ChatError::Ingest(IngestError::PdfParse(_)))
    ));
    assert!(!chat.is_ready());
}
